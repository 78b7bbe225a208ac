// Controller Module - hierarchical appliance state machine
//
// The transition table and graph rendering are pure; the actor owns all
// mutable state and is reached through ControllerHandle.

pub(crate) mod actor;
pub mod errors;
pub mod feedback;
pub mod graph;
pub mod handle;
pub mod table;
pub mod types;

#[cfg(test)]
mod tests;

pub use errors::{ControllerError, ParseError, TerminationFailure};
pub use feedback::{Feedback, FeedbackSender, FeedbackSource};
pub use graph::render_dot;
pub use handle::ControllerHandle;
pub use table::{TransitionPath, TransitionTable};
pub use types::{
    ControllerSnapshot, ControllerState, ControllerStatus, TemperatureMode, Transition, Trigger,
};
