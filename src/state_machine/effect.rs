//! Effects produced by state transitions

use super::state::{Suspension, ToolInvocationRequest};
use crate::db::MessageContent;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the session's working copy
    AppendMessage(MessageContent),

    /// Call the model with the current history and tool catalog
    RequestModel,

    /// Run a tool executor
    ExecuteTool { request: ToolInvocationRequest },

    /// End the turn with a reply
    Reply { text: String },

    /// End the turn suspended
    Suspend { suspension: Suspension },
}

impl Effect {
    pub fn append_user(text: impl Into<String>) -> Self {
        Effect::AppendMessage(MessageContent::user(text))
    }

    pub fn append_agent(text: impl Into<String>, tool_call: Option<ToolInvocationRequest>) -> Self {
        Effect::AppendMessage(MessageContent::agent(text, tool_call))
    }

    pub fn append_tool(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Effect::AppendMessage(MessageContent::tool(tool_use_id, content, is_error))
    }

    pub fn ends_turn(&self) -> bool {
        matches!(self, Effect::Reply { .. } | Effect::Suspend { .. })
    }
}
