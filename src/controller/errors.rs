use thiserror::Error;

use crate::controller::types::{ControllerState, Trigger};
use crate::workflow::WorkflowHandle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown trigger '{0}'")]
    UnknownTrigger(String),
    #[error("Unknown state '{0}'")]
    UnknownState(String),
    #[error("Unsupported temperature mode '{0}'")]
    UnsupportedTemperatureMode(String),
}

/// Why the running brewing workflow could not be confirmed terminated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TerminationFailure {
    #[error("workflow engine refused to terminate the instance")]
    Refused,
    #[error("no acknowledgement within {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },
    #[error("caller stopped waiting before acknowledgement")]
    Interrupted,
    #[error("workflow engine error: {0}")]
    Engine(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("Trigger {trigger} is not permitted in state {state}")]
    InvalidTransition {
        state: ControllerState,
        trigger: Trigger,
    },
    #[error("Failed to terminate brewing workflow {handle}: {reason}")]
    WorkflowTerminationFailed {
        handle: WorkflowHandle,
        reason: TerminationFailure,
    },
    #[error("Failed to start workflow '{workflow}': {reason}")]
    WorkflowStartFailed { workflow: String, reason: String },
    #[error("Controller is faulted: {0}")]
    Faulted(String),
    #[error("{0} is a composite state and cannot be entered directly")]
    CompositeState(ControllerState),
    #[error("Controller is no longer running")]
    Stopped,
}

impl ControllerError {
    /// Faults that a higher layer must surface loudly.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ControllerError::WorkflowTerminationFailed { .. } | ControllerError::Faulted(_)
        )
    }
}
