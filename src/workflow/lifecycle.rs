use statig::prelude::*;

use crate::workflow::types::{InstanceStatus, WorkflowHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceEvent {
    Start,
    EnterStep { step: String },
    Finish,
    Terminate,
    Fail { reason: String },
}

/// Lifecycle of a single workflow instance inside the engine.
///
/// Terminal states ignore every further event, so a late `Terminate` after a
/// natural finish leaves the instance `completed`.
#[derive(Debug, Default)]
pub struct InstanceLifecycle {
    pub handle: Option<WorkflowHandle>,
    pub current_step: Option<String>,
    pub steps_finished: usize,
    pub failure: Option<String>,
}

impl InstanceLifecycle {
    pub fn new(handle: WorkflowHandle) -> Self {
        Self {
            handle: Some(handle),
            ..Default::default()
        }
    }
}

#[state_machine(initial = "State::pending()")]
impl InstanceLifecycle {
    #[state]
    fn pending(&mut self, event: &InstanceEvent) -> Outcome<State> {
        match event {
            InstanceEvent::Start => {
                tracing::debug!(handle = ?self.handle, "Workflow instance started");
                Transition(State::running())
            }
            InstanceEvent::Terminate => Transition(State::terminated()),
            InstanceEvent::Fail { reason } => {
                self.failure = Some(reason.clone());
                Transition(State::failed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn running(&mut self, event: &InstanceEvent) -> Outcome<State> {
        match event {
            InstanceEvent::EnterStep { step } => {
                if self.current_step.is_some() {
                    self.steps_finished += 1;
                }
                self.current_step = Some(step.clone());
                Handled
            }
            InstanceEvent::Finish => {
                if self.current_step.take().is_some() {
                    self.steps_finished += 1;
                }
                tracing::debug!(
                    handle = ?self.handle,
                    steps_finished = self.steps_finished,
                    "Workflow instance completed"
                );
                Transition(State::completed())
            }
            InstanceEvent::Terminate => {
                tracing::debug!(
                    handle = ?self.handle,
                    step = ?self.current_step,
                    "Workflow instance terminated"
                );
                Transition(State::terminated())
            }
            InstanceEvent::Fail { reason } => {
                self.failure = Some(reason.clone());
                Transition(State::failed())
            }
            InstanceEvent::Start => Handled,
        }
    }

    #[state]
    fn completed(&mut self) -> Outcome<State> {
        Handled
    }

    #[state]
    fn terminated(&mut self) -> Outcome<State> {
        Handled
    }

    #[state]
    fn failed(&mut self) -> Outcome<State> {
        Handled
    }
}

/// Maps the machine's current state onto the engine-facing status.
pub fn status_of(machine: &StateMachine<InstanceLifecycle>) -> InstanceStatus {
    match machine.state() {
        State::Pending { .. } => InstanceStatus::Pending,
        State::Running { .. } => InstanceStatus::Running {
            step: machine.inner().current_step.clone().unwrap_or_default(),
        },
        State::Completed { .. } => InstanceStatus::Completed,
        State::Terminated { .. } => InstanceStatus::Terminated,
        State::Failed { .. } => InstanceStatus::Failed {
            reason: machine.inner().failure.clone().unwrap_or_default(),
        },
    }
}
