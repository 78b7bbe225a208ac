// Channel used by background activity to post triggers back to the controller

use tokio::sync::mpsc;

use crate::controller::types::Trigger;
use crate::workflow::WorkflowHandle;

/// Who raised a feedback trigger, so the controller can recognise stale ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackSource {
    /// A temperature simulator loop, tagged with its preheat session.
    Simulator { session: u64 },
    /// A workflow instance, tagged with the handle it was started under.
    Workflow { handle: WorkflowHandle },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub trigger: Trigger,
    pub source: FeedbackSource,
}

/// Never blocks: the actor may be awaiting the very task that posts feedback.
#[derive(Debug, Clone)]
pub struct FeedbackSender {
    tx: mpsc::UnboundedSender<Feedback>,
}

impl FeedbackSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Feedback>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the controller has stopped.
    pub fn notify(&self, trigger: Trigger, source: FeedbackSource) -> bool {
        self.tx.send(Feedback { trigger, source }).is_ok()
    }
}
