//! Pure state transition function
//!
//! Given the same state, context, and event this always yields the same
//! result. All I/O is expressed as returned effects.

use super::event::{Decision, DecisionAction, ToolOutcome, Verdict};
use super::state::{DecisionKind, Suspension, TurnContext, TurnState};
use super::{Effect, Event};
use thiserror::Error;

/// Tool-result content recorded when a human rejects a suspended call
pub const REJECTION_SENTINEL: &str = "User rejected this action.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Session is suspended awaiting a decision on {suspension_id}")]
    SessionSuspended { suspension_id: String },
    #[error("No pending suspension matches {target_id}")]
    NoMatchingSuspension { target_id: String },
    #[error("Decision `{decision}` is not allowed for this suspension")]
    DecisionNotAllowed { decision: DecisionKind },
    #[error("Exceeded {limit} tool calls in one turn")]
    LoopLimitExceeded { limit: u32 },
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Content of the tool result recorded for a rejection
pub fn rejection_message(reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{REJECTION_SENTINEL} Reason: {reason}"),
        None => REJECTION_SENTINEL.to_string(),
    }
}

/// Pure transition function
pub fn transition(
    state: &TurnState,
    context: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Submit
        // ============================================================
        (TurnState::Idle, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(TurnState::AwaitingModel { tool_calls: 0 })
                .with_effect(Effect::append_user(text))
                .with_effect(Effect::RequestModel))
        }

        (TurnState::Suspended(s), Event::UserMessage { .. }) => {
            Err(TransitionError::SessionSuspended {
                suspension_id: s.id.clone(),
            })
        }

        // ============================================================
        // Model output
        // ============================================================
        (TurnState::AwaitingModel { .. }, Event::ModelText { text }) => {
            Ok(TransitionResult::new(TurnState::Idle)
                .with_effect(Effect::append_agent(text.clone(), None))
                .with_effect(Effect::Reply { text }))
        }

        // Blocked calls are recorded but never executed here
        (
            TurnState::AwaitingModel { .. },
            Event::ToolRequested {
                request,
                text,
                verdict: Verdict::Block(allowed_decisions),
                requested_at,
            },
        ) => {
            let suspension = Suspension {
                id: request.id.clone(),
                request: request.clone(),
                allowed_decisions,
                created_at: requested_at,
                executed: None,
            };
            Ok(TransitionResult::new(TurnState::Suspended(suspension.clone()))
                .with_effect(Effect::append_agent(text, Some(request)))
                .with_effect(Effect::Suspend { suspension }))
        }

        (TurnState::AwaitingModel { tool_calls }, Event::ToolRequested { .. })
            if *tool_calls >= context.max_tool_calls =>
        {
            Err(TransitionError::LoopLimitExceeded {
                limit: context.max_tool_calls,
            })
        }

        (
            TurnState::AwaitingModel { tool_calls },
            Event::ToolRequested {
                request,
                text,
                verdict: Verdict::Invalid(reason),
                ..
            },
        ) => {
            let id = request.id.clone();
            Ok(TransitionResult::new(TurnState::AwaitingModel {
                tool_calls: tool_calls + 1,
            })
            .with_effect(Effect::append_agent(text, Some(request)))
            .with_effect(Effect::append_tool(id, reason, true))
            .with_effect(Effect::RequestModel))
        }

        (
            TurnState::AwaitingModel { tool_calls },
            Event::ToolRequested {
                request,
                text,
                verdict: Verdict::Proceed,
                ..
            },
        ) => Ok(TransitionResult::new(TurnState::ExecutingTool {
            request: request.clone(),
            tool_calls: tool_calls + 1,
        })
        .with_effect(Effect::append_agent(text, Some(request.clone())))
        .with_effect(Effect::ExecuteTool { request })),

        // ============================================================
        // Tool execution
        // ============================================================
        (
            TurnState::ExecutingTool {
                request,
                tool_calls,
            },
            Event::ToolComplete { result },
        ) if result.tool_use_id == request.id => {
            let ToolOutcome {
                tool_use_id,
                content,
                is_error,
            } = result;
            Ok(TransitionResult::new(TurnState::AwaitingModel {
                tool_calls: *tool_calls,
            })
            .with_effect(Effect::append_tool(tool_use_id, content, is_error))
            .with_effect(Effect::RequestModel))
        }

        // ============================================================
        // Resume
        // ============================================================
        (TurnState::Suspended(suspension), Event::Decision(decision)) => {
            resolve_suspension(suspension, decision)
        }

        (TurnState::Idle, Event::Decision(Decision { target_id, .. })) => {
            Err(TransitionError::NoMatchingSuspension { target_id })
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

fn resolve_suspension(
    suspension: &Suspension,
    decision: Decision,
) -> Result<TransitionResult, TransitionError> {
    if decision.target_id != suspension.id {
        return Err(TransitionError::NoMatchingSuspension {
            target_id: decision.target_id,
        });
    }

    let kind = decision.action.kind();
    if !suspension.allows(kind) {
        return Err(TransitionError::DecisionNotAllowed { decision: kind });
    }

    // The call already ran on an earlier attempt; only its result is replayed
    if let Some(outcome) = &suspension.executed {
        if kind == DecisionKind::Reject {
            return Err(TransitionError::DecisionNotAllowed { decision: kind });
        }
        return Ok(TransitionResult::new(TurnState::AwaitingModel { tool_calls: 0 })
            .with_effect(Effect::append_tool(
                outcome.tool_use_id.clone(),
                outcome.content.clone(),
                outcome.is_error,
            ))
            .with_effect(Effect::RequestModel));
    }

    // A resumed turn gets a fresh tool-call budget
    match decision.action {
        DecisionAction::Approve => Ok(TransitionResult::new(TurnState::ExecutingTool {
            request: suspension.request.clone(),
            tool_calls: 0,
        })
        .with_effect(Effect::ExecuteTool {
            request: suspension.request.clone(),
        })),

        DecisionAction::Edit { arguments } => {
            let request = suspension.request.with_arguments(arguments);
            Ok(TransitionResult::new(TurnState::ExecutingTool {
                request: request.clone(),
                tool_calls: 0,
            })
            .with_effect(Effect::ExecuteTool { request }))
        }

        DecisionAction::Reject { reason } => {
            Ok(TransitionResult::new(TurnState::AwaitingModel { tool_calls: 0 })
                .with_effect(Effect::append_tool(
                    suspension.id.clone(),
                    rejection_message(reason.as_deref()),
                    false,
                ))
                .with_effect(Effect::RequestModel))
        }
    }
}
