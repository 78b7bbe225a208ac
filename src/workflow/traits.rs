// Traits for the workflow engine boundary - separating the controller from
// whichever engine executes its long-running processes

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::workflow::errors::WorkflowError;
use crate::workflow::types::{InstanceStatus, StepContext, StepOutcome, WorkflowDefinition, WorkflowHandle};

/// Workflow engine interface consumed by the controller
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Make a workflow definition available under its id
    async fn register(&self, definition: WorkflowDefinition);

    /// Start an instance of a registered workflow; returns without waiting for any step
    async fn start(&self, workflow_id: &str) -> Result<WorkflowHandle, WorkflowError>;

    /// Request cancellation and report whether the instance has stopped
    async fn terminate(&self, handle: &WorkflowHandle) -> Result<bool, WorkflowError>;

    /// Current lifecycle status, if the handle is known
    async fn status(&self, handle: &WorkflowHandle) -> Option<InstanceStatus>;
}

/// One unit of work inside a workflow
#[async_trait]
pub trait WorkflowStep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, WorkflowError>;
}
