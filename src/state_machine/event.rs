//! Events that drive state transitions

use super::state::{DecisionKind, ToolInvocationRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pre-computed verdict on a tool request
///
/// The engine consults the registry and policy before building the event
/// so the transition itself stays pure.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Unknown tool or bad arguments; fed back to the model as an error
    Invalid(String),
    /// Run it now
    Proceed,
    /// Suspend for human review
    Block(Vec<DecisionKind>),
}

/// Result of running a tool executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool_use_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn success(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: message.into(),
            is_error: true,
        }
    }
}

/// A human's resolution of a suspension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub target_id: String,
    pub action: DecisionAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DecisionAction {
    Approve,
    Reject {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Replacement arguments, already validated against the tool's schema
    Edit { arguments: Value },
}

impl DecisionAction {
    pub fn kind(&self) -> DecisionKind {
        match self {
            DecisionAction::Approve => DecisionKind::Approve,
            DecisionAction::Reject { .. } => DecisionKind::Reject,
            DecisionAction::Edit { .. } => DecisionKind::Edit,
        }
    }
}

/// Events that can occur during a turn
#[derive(Debug, Clone)]
pub enum Event {
    UserMessage {
        text: String,
    },

    /// The model answered with text only
    ModelText {
        text: String,
    },

    /// The model asked for a tool
    ToolRequested {
        request: ToolInvocationRequest,
        /// Prose the model emitted alongside the call
        text: String,
        verdict: Verdict,
        requested_at: DateTime<Utc>,
    },

    ToolComplete {
        result: ToolOutcome,
    },

    Decision(Decision),
}
