use thiserror::Error;

use crate::workflow::types::WorkflowHandle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Workflow '{0}' is not registered")]
    UnknownWorkflow(String),
    #[error("No workflow instance with handle {0}")]
    UnknownInstance(WorkflowHandle),
    #[error("Step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },
    #[error("Workflow engine is shutting down")]
    ShuttingDown,
}
