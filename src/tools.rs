//! Tool registry and the email assistant's tools
//!
//! Tools are resolved by name against a registry validated at registration
//! time. Whether a tool is side-effecting is registry metadata, not a
//! property of the tool, so the same tool can be gated in one deployment
//! and ungated in another.

mod generate_draft;
mod save_draft;
pub mod schema;
mod search_inbox;
mod send_email;

pub use generate_draft::GenerateDraftTool;
pub use save_draft::SaveDraftTool;
pub use schema::{ArgSchema, SchemaError};
pub use search_inbox::SearchInboxTool;
pub use send_email::SendEmailTool;

use crate::config::DeliveryMode;
use crate::llm::{LlmService, ToolDefinition};
use crate::mail::Mailbox;
use crate::retrieval::Retriever;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Registry lookup and validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    NotFound(String),
    #[error("tool already registered: {0}")]
    Duplicate(String),
    #[error("tool {tool} declares a bad schema: {reason}")]
    InvalidSchema { tool: String, reason: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A tool executor failed. Recorded as an error tool result, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-invocation context handed to a tool
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The session this tool is executing within
    pub session_id: String,
    /// Id of the invocation request being executed
    pub call_id: String,
}

impl ToolContext {
    pub fn new(session_id: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            call_id: call_id.into(),
        }
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for the model
    fn description(&self) -> String;

    /// JSON Schema for the arguments
    fn input_schema(&self) -> Value;

    /// Execute with arguments already validated against `input_schema()`
    async fn run(&self, arguments: Value, ctx: ToolContext) -> Result<String, ExecutionError>;
}

type ToolFn = dyn Fn(Value) -> Result<String, ExecutionError> + Send + Sync;

/// Tool backed by a plain function, for wiring ad-hoc tools without a type
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    run: Box<ToolFn>,
}

impl FnTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        run: impl Fn(Value) -> Result<String, ExecutionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            run: Box::new(run),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn run(&self, arguments: Value, _ctx: ToolContext) -> Result<String, ExecutionError> {
        (self.run)(arguments)
    }
}

/// A registered tool: executor plus policy metadata
#[derive(Clone)]
pub struct ToolDef {
    tool: Arc<dyn Tool>,
    schema: Arc<ArgSchema>,
    side_effecting: bool,
}

impl ToolDef {
    pub fn name(&self) -> &str {
        self.tool.name()
    }

    pub fn schema(&self) -> &ArgSchema {
        &self.schema
    }

    pub fn side_effecting(&self) -> bool {
        self.side_effecting
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.tool.name().to_string(),
            description: self.tool.description(),
            input_schema: self.schema.json().clone(),
        }
    }
}

impl std::fmt::Debug for ToolDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDef")
            .field("name", &self.name())
            .field("side_effecting", &self.side_effecting)
            .finish_non_exhaustive()
    }
}

/// Collection of tools available to sessions
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

/// Collaborators the email tools need
#[derive(Clone)]
pub struct EmailToolDeps {
    pub retriever: Arc<dyn Retriever>,
    pub drafter: Arc<dyn LlmService>,
    pub mailbox: Arc<Mailbox>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the email assistant's tool set for a delivery mode.
    ///
    /// Tools named in `gated` are registered as side-effecting.
    pub fn email_assistant(
        mode: DeliveryMode,
        deps: &EmailToolDeps,
        gated: &HashSet<String>,
    ) -> Result<Self, ToolError> {
        let mut tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(SearchInboxTool::new(deps.retriever.clone())),
            Arc::new(GenerateDraftTool::new(deps.drafter.clone())),
            Arc::new(SaveDraftTool::new(deps.mailbox.clone())),
        ];
        if mode == DeliveryMode::Send {
            tools.push(Arc::new(SendEmailTool::new(deps.mailbox.clone())));
        }

        let mut registry = Self::new();
        for tool in tools {
            let side_effecting = gated.contains(tool.name());
            registry.register(tool, side_effecting)?;
        }
        Ok(registry)
    }

    /// Register a tool, compiling its schema. Names are unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>, side_effecting: bool) -> Result<(), ToolError> {
        if self.tools.iter().any(|t| t.name() == tool.name()) {
            return Err(ToolError::Duplicate(tool.name().to_string()));
        }
        let schema = ArgSchema::compile(tool.input_schema()).map_err(|reason| {
            ToolError::InvalidSchema {
                tool: tool.name().to_string(),
                reason,
            }
        })?;
        self.tools.push(ToolDef {
            tool,
            schema: Arc::new(schema),
            side_effecting,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ToolDef, ToolError> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Validate arguments for a named tool, returning the sanitized map
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<Value, ToolError> {
        Ok(self.get(name)?.schema.validate(arguments)?)
    }

    /// Tool catalog for the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDef::definition).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDef> {
        self.tools.iter()
    }

    /// Execute a tool by name with validated arguments
    pub async fn execute(
        &self,
        name: &str,
        arguments: Value,
        ctx: ToolContext,
    ) -> Result<String, ExecutionError> {
        let def = self
            .get(name)
            .map_err(|e| ExecutionError::new(e.to_string()))?;
        def.tool.run(arguments, ctx).await
    }
}
