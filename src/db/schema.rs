//! Database schema and types

pub use crate::state_machine::state::{Suspension, ToolInvocationRequest};
use crate::state_machine::TurnState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    pending_suspension TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    message_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    sequence_id INTEGER NOT NULL,
    message_type TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE,
    UNIQUE (session_id, sequence_id)
);

CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, sequence_id);
";

// ============================================================
// Message Content Types
// ============================================================

/// User message content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContent {
    pub text: String,
}

/// Assistant message content. `text` may be empty when a call is attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentContent {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolInvocationRequest>,
}

/// Tool result message content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolContent {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

/// Typed message content
///
/// Stored as separate `message_type` and `content` columns.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    User(UserContent),
    Agent(AgentContent),
    Tool(ToolContent),
}

impl MessageContent {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::User(_) => MessageType::User,
            Self::Agent(_) => MessageType::Agent,
            Self::Tool(_) => MessageType::Tool,
        }
    }

    /// Serialize content to JSON value (without type tag)
    pub fn to_json(&self) -> Value {
        match self {
            Self::User(c) => serde_json::to_value(c).unwrap_or(Value::Null),
            Self::Agent(c) => serde_json::to_value(c).unwrap_or(Value::Null),
            Self::Tool(c) => serde_json::to_value(c).unwrap_or(Value::Null),
        }
    }

    /// Deserialize content using the message type as discriminator
    pub fn from_json(msg_type: MessageType, value: Value) -> Result<Self, String> {
        match msg_type {
            MessageType::User => serde_json::from_value(value)
                .map(Self::User)
                .map_err(|e| format!("Invalid user content: {e}")),
            MessageType::Agent => serde_json::from_value(value)
                .map(Self::Agent)
                .map_err(|e| format!("Invalid agent content: {e}")),
            MessageType::Tool => serde_json::from_value(value)
                .map(Self::Tool)
                .map_err(|e| format!("Invalid tool content: {e}")),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User(UserContent { text: text.into() })
    }

    pub fn agent(text: impl Into<String>, tool_call: Option<ToolInvocationRequest>) -> Self {
        Self::Agent(AgentContent {
            text: text.into(),
            tool_call,
        })
    }

    pub fn tool(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self::Tool(ToolContent {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        })
    }
}

// Serializes just the inner value; the type lives in `message_type`
impl Serialize for MessageContent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::User(c) => c.serialize(serializer),
            Self::Agent(c) => c.serialize(serializer),
            Self::Tool(c) => c.serialize(serializer),
        }
    }
}

/// Message type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    User,
    Agent,
    Tool,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::User => write!(f, "user"),
            MessageType::Agent => write!(f, "agent"),
            MessageType::Tool => write!(f, "tool"),
        }
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageType::User),
            "agent" => Ok(MessageType::Agent),
            "tool" => Ok(MessageType::Tool),
            other => Err(format!("Unknown message type: {other}")),
        }
    }
}

/// Message record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Message {
    pub message_id: String,
    pub sequence_id: i64,
    pub message_type: MessageType,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
}

/// One continuous conversation
///
/// `messages` is append-only during normal flow. At most one suspension is
/// pending at a time.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub pending_suspension: Option<Suspension>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh, unsaved session
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            pending_suspension: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message, assigning the next sequence id
    pub fn append(&mut self, content: MessageContent) -> &Message {
        let sequence_id = self.messages.last().map_or(1, |m| m.sequence_id + 1);
        let now = Utc::now();
        self.messages.push(Message {
            message_id: uuid::Uuid::new_v4().to_string(),
            sequence_id,
            message_type: content.message_type(),
            content,
            created_at: now,
        });
        self.updated_at = now;
        &self.messages[self.messages.len() - 1]
    }

    pub fn state(&self) -> TurnState {
        TurnState::from_pending(self.pending_suspension.as_ref())
    }

    pub fn last_sequence_id(&self) -> i64 {
        self.messages.last().map_or(0, |m| m.sequence_id)
    }
}
