// Brewing process executed by the workflow engine on the controller's behalf

pub mod steps;

pub use steps::{brewing_workflow, BrewingTimings, EndStep, HoldStep, StartStep, BREWING_WORKFLOW_ID};
