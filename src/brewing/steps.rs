use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::controller::feedback::{FeedbackSender, FeedbackSource};
use crate::controller::types::Trigger;
use crate::workflow::{StepContext, StepOutcome, WorkflowDefinition, WorkflowError, WorkflowStep};

pub const BREWING_WORKFLOW_ID: &str = "brewing";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrewingTimings {
    pub start_delay: Duration,
    pub hold_duration: Duration,
}

impl Default for BrewingTimings {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_secs(5),
            hold_duration: Duration::from_secs(120),
        }
    }
}

impl BrewingTimings {
    pub fn total(&self) -> Duration {
        self.start_delay + self.hold_duration
    }
}

/// Builds the three-step brewing process: start, hold, end.
pub fn brewing_workflow(id: &str, timings: BrewingTimings, feedback: FeedbackSender) -> WorkflowDefinition {
    WorkflowDefinition::new(id)
        .step(StartStep {
            delay: timings.start_delay,
        })
        .step(HoldStep {
            duration: timings.hold_duration,
        })
        .step(EndStep { feedback })
}

/// Warms up the group head before water flows.
#[derive(Debug)]
pub struct StartStep {
    delay: Duration,
}

#[async_trait]
impl WorkflowStep for StartStep {
    fn name(&self) -> &str {
        "start"
    }

    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, WorkflowError> {
        debug!(handle = %ctx.handle(), delay_ms = self.delay.as_millis() as u64, "Brew starting");
        Ok(ctx.sleep(self.delay).await)
    }
}

/// The brew itself; returns promptly when the engine cancels the instance.
#[derive(Debug)]
pub struct HoldStep {
    duration: Duration,
}

#[async_trait]
impl WorkflowStep for HoldStep {
    fn name(&self) -> &str {
        "hold"
    }

    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, WorkflowError> {
        let outcome = ctx.sleep(self.duration).await;
        if outcome == StepOutcome::Cancelled {
            info!(handle = %ctx.handle(), "Brew interrupted during hold");
        }
        Ok(outcome)
    }
}

/// Reports completion to the controller without waiting on it.
#[derive(Debug)]
pub struct EndStep {
    feedback: FeedbackSender,
}

#[async_trait]
impl WorkflowStep for EndStep {
    fn name(&self) -> &str {
        "end"
    }

    async fn run(&self, ctx: &StepContext) -> Result<StepOutcome, WorkflowError> {
        if ctx.is_cancellation_requested() {
            info!(handle = %ctx.handle(), "Brew already terminated, not reporting completion");
            return Ok(StepOutcome::Cancelled);
        }

        let source = FeedbackSource::Workflow {
            handle: ctx.handle().clone(),
        };
        if !self.feedback.notify(Trigger::BrewingComplete, source) {
            warn!(handle = %ctx.handle(), "Controller stopped before brew completion was reported");
        }
        Ok(StepOutcome::Continue)
    }
}
