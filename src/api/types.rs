//! API request and response types

use crate::db::Message;
use crate::runtime::TurnOutcome;
use crate::state_machine::{Decision, DecisionAction, DecisionKind, Suspension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to send a user message
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// Request to resolve a suspension
#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub target_id: String,
    pub decision: DecisionKind,
    /// Replacement arguments, required for `edit`
    #[serde(default)]
    pub arguments: Option<Value>,
    /// Optional explanation, used for `reject`
    #[serde(default)]
    pub reason: Option<String>,
}

impl ResumeRequest {
    pub fn into_decision(self) -> Result<Decision, String> {
        let action = match self.decision {
            DecisionKind::Approve => DecisionAction::Approve,
            DecisionKind::Reject => DecisionAction::Reject {
                reason: self.reason,
            },
            DecisionKind::Edit => DecisionAction::Edit {
                arguments: self
                    .arguments
                    .ok_or_else(|| "edit decisions require `arguments`".to_string())?,
            },
        };
        Ok(Decision {
            target_id: self.target_id,
            action,
        })
    }
}

/// The tool call a suspension is waiting on
#[derive(Debug, Serialize)]
pub struct RequestView {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
pub struct SuspensionView {
    pub suspension_id: String,
    pub request: RequestView,
    pub allowed_decisions: Vec<DecisionKind>,
    pub created_at: String,
    /// The call already ran; resuming only retries the follow-up
    pub executed: bool,
}

impl From<Suspension> for SuspensionView {
    fn from(s: Suspension) -> Self {
        Self {
            suspension_id: s.id,
            request: RequestView {
                name: s.request.name,
                arguments: s.request.arguments,
            },
            allowed_decisions: s.allowed_decisions,
            created_at: s.created_at.to_rfc3339(),
            executed: s.executed.is_some(),
        }
    }
}

/// Result of a submit or resume call
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutcomeResponse {
    Reply {
        text: String,
    },
    Suspended {
        suspension_id: String,
        request: RequestView,
        allowed_decisions: Vec<DecisionKind>,
    },
}

impl From<TurnOutcome> for OutcomeResponse {
    fn from(outcome: TurnOutcome) -> Self {
        match outcome {
            TurnOutcome::Reply { text } => OutcomeResponse::Reply { text },
            TurnOutcome::Suspended { suspension } => {
                let view = SuspensionView::from(suspension);
                OutcomeResponse::Suspended {
                    suspension_id: view.suspension_id,
                    request: view.request,
                    allowed_decisions: view.allowed_decisions,
                }
            }
        }
    }
}

/// Session with history
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub pending_suspension: Option<SuspensionView>,
}

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub side_effecting: bool,
    pub input_schema: Value,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolInfo>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.into(),
        }
    }
}
