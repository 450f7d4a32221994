//! Turn state types

use super::event::ToolOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The model's request to call a tool. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocationRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Same call with replaced arguments
    #[must_use]
    pub fn with_arguments(&self, arguments: Value) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments,
        }
    }
}

/// Kinds of decision a human may make about a suspended call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Reject,
    Edit,
}

impl DecisionKind {
    pub const ALL: [DecisionKind; 3] = [DecisionKind::Approve, DecisionKind::Reject, DecisionKind::Edit];
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionKind::Approve => write!(f, "approve"),
            DecisionKind::Reject => write!(f, "reject"),
            DecisionKind::Edit => write!(f, "edit"),
        }
    }
}

/// A paused turn awaiting a human decision.
///
/// `id` equals the blocked request's id and is the resume key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suspension {
    pub id: String,
    pub request: ToolInvocationRequest,
    pub allowed_decisions: Vec<DecisionKind>,
    pub created_at: DateTime<Utc>,
    /// Set once an approved or edited call has run. The suspension stays
    /// pending until the follow-up model call succeeds, and a retried
    /// resume replays this instead of running the tool again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed: Option<ToolOutcome>,
}

impl Suspension {
    pub fn allows(&self, kind: DecisionKind) -> bool {
        self.allowed_decisions.contains(&kind)
    }
}

/// Turn state
///
/// `Idle` and `Suspended` are the only states that outlive a turn; the
/// other two exist while the engine is driving the model/tool loop.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    Idle,

    /// Waiting on the model; `tool_calls` counts tool invocations this turn
    AwaitingModel { tool_calls: u32 },

    /// Running an approved or ungated tool
    ExecutingTool {
        request: ToolInvocationRequest,
        tool_calls: u32,
    },

    Suspended(Suspension),
}

impl TurnState {
    /// Durable state for a session's pending suspension
    pub fn from_pending(pending: Option<&Suspension>) -> Self {
        match pending {
            Some(s) => TurnState::Suspended(s.clone()),
            None => TurnState::Idle,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Idle | TurnState::Suspended(_))
    }

    pub fn suspension(&self) -> Option<&Suspension> {
        match self {
            TurnState::Suspended(s) => Some(s),
            _ => None,
        }
    }
}

/// Static context for a transition
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: String,
    pub max_tool_calls: u32,
}

impl TurnContext {
    pub fn new(session_id: impl Into<String>, max_tool_calls: u32) -> Self {
        Self {
            session_id: session_id.into(),
            max_tool_calls,
        }
    }
}
