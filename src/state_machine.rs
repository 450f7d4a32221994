//! Turn state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Decision, DecisionAction, Event, ToolOutcome, Verdict};
pub use state::{DecisionKind, Suspension, ToolInvocationRequest, TurnContext, TurnState};
pub use transition::{rejection_message, transition, TransitionError, REJECTION_SENTINEL};
