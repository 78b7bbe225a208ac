// Brewline Library - coffee machine controller
// This exposes the core components for testing and integration

pub mod brewing;
pub mod config;
pub mod controller;
pub mod observability;
pub mod shutdown;
pub mod telemetry;
pub mod thermal;
pub mod workflow;

// Re-export key types for easy access
pub use brewing::{brewing_workflow, BrewingTimings, BREWING_WORKFLOW_ID};
pub use config::BrewlineConfig;
pub use controller::{
    render_dot, ControllerError, ControllerHandle, ControllerSnapshot, ControllerState, ControllerStatus,
    ParseError, TemperatureMode, TerminationFailure, Transition, TransitionTable, Trigger,
};
pub use observability::{ControllerMetrics, ControllerStats, OperationTimer};
pub use shutdown::ShutdownCoordinator;
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use thermal::{TemperatureSimulator, Thermostat};
pub use workflow::{
    InMemoryWorkflowEngine, InstanceStatus, WorkflowDefinition, WorkflowEngine, WorkflowError, WorkflowHandle,
    WorkflowStep,
};
