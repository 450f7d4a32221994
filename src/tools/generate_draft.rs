//! Draft generation tool
//!
//! Asks the model for an email body given a recipient and free-form
//! details. Produces text only; nothing is saved or sent.

use super::{ExecutionError, Tool, ToolContext};
use crate::llm::{LlmMessage, LlmRequest, LlmService};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const DRAFT_MAX_TOKENS: u32 = 1024;

pub struct GenerateDraftTool {
    llm: Arc<dyn LlmService>,
}

impl GenerateDraftTool {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }
}

#[derive(Debug, Deserialize)]
struct DraftInput {
    recipient: String,
    details: String,
}

#[async_trait]
impl Tool for GenerateDraftTool {
    fn name(&self) -> &'static str {
        "generate_draft"
    }

    fn description(&self) -> String {
        "Generate an email draft for a recipient from a description of what it should say. \
         Returns the draft text; it does not save or send anything."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["recipient", "details"],
            "properties": {
                "recipient": {"type": "string", "description": "Who the email is for"},
                "details": {
                    "type": "string",
                    "description": "What the email should say, including relevant context"
                }
            }
        })
    }

    async fn run(&self, arguments: Value, _ctx: ToolContext) -> Result<String, ExecutionError> {
        let input: DraftInput = serde_json::from_value(arguments)
            .map_err(|e| ExecutionError::new(format!("Invalid input: {e}")))?;

        let request = LlmRequest {
            system: vec![],
            messages: vec![LlmMessage::user_text(format!(
                "Draft an email to {} using details: {}",
                input.recipient, input.details
            ))],
            tools: vec![],
            max_tokens: Some(DRAFT_MAX_TOKENS),
        };

        let response = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| ExecutionError::new(format!("Draft generation failed: {}", e.message)))?;

        Ok(response.text())
    }
}
