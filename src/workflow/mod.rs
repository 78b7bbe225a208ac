// Workflow engine boundary and the in-process engine used by the controller

pub mod engine;
pub mod errors;
pub mod lifecycle;
pub mod traits;
pub mod types;

pub use engine::{InMemoryWorkflowEngine, InstanceSummary};
pub use errors::WorkflowError;
pub use traits::{WorkflowEngine, WorkflowStep};
pub use types::{InstanceStatus, StepContext, StepOutcome, WorkflowDefinition, WorkflowHandle};

#[cfg(test)]
pub use traits::MockWorkflowEngine;
