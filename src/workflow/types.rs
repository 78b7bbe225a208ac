use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::workflow::traits::WorkflowStep;

/// Opaque identifier of one running workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowHandle(String);

impl WorkflowHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Mints a fresh handle for an instance of `workflow_id`.
    pub fn generate(workflow_id: &str) -> Self {
        Self(format!("{}-{}", workflow_id, uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a workflow instance as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Pending,
    Running { step: String },
    Completed,
    Terminated,
    Failed { reason: String },
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Completed | InstanceStatus::Terminated | InstanceStatus::Failed { .. }
        )
    }
}

/// What a step asks the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// The step observed cancellation and stopped early.
    Cancelled,
}

/// An ordered list of steps registered under a workflow id.
#[derive(Clone)]
pub struct WorkflowDefinition {
    pub id: String,
    pub steps: Vec<Arc<dyn WorkflowStep>>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: impl WorkflowStep + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.name().to_string()).collect()
    }
}

impl fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("id", &self.id)
            .field("steps", &self.step_names())
            .finish()
    }
}

/// Per-instance context handed to every step.
#[derive(Debug, Clone)]
pub struct StepContext {
    handle: WorkflowHandle,
    cancellation: CancellationToken,
}

impl StepContext {
    pub fn new(handle: WorkflowHandle, cancellation: CancellationToken) -> Self {
        Self {
            handle,
            cancellation,
        }
    }

    pub fn handle(&self) -> &WorkflowHandle {
        &self.handle
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    /// Sleeps for `duration` unless cancellation arrives first.
    ///
    /// Returns [`StepOutcome::Cancelled`] when the wait was cut short.
    pub async fn sleep(&self, duration: Duration) -> StepOutcome {
        tokio::select! {
            _ = self.cancellation.cancelled() => StepOutcome::Cancelled,
            _ = tokio::time::sleep(duration) => StepOutcome::Continue,
        }
    }
}
