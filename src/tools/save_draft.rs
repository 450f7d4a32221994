//! Save-draft tool

use super::{ExecutionError, Tool, ToolContext};
use crate::mail::{Mailbox, OutgoingEmail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct SaveDraftTool {
    mailbox: Arc<Mailbox>,
}

impl SaveDraftTool {
    pub fn new(mailbox: Arc<Mailbox>) -> Self {
        Self { mailbox }
    }
}

#[derive(Debug, Deserialize)]
struct SaveInput {
    subject: String,
    body: String,
    #[serde(default)]
    recipient: Option<String>,
}

#[async_trait]
impl Tool for SaveDraftTool {
    fn name(&self) -> &'static str {
        "save_draft"
    }

    fn description(&self) -> String {
        "Save an email as a draft in the user's mailbox. The user reviews the draft before \
         it is saved."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["subject", "body"],
            "properties": {
                "subject": {"type": "string", "description": "Subject line"},
                "body": {"type": "string", "description": "Full email body"},
                "recipient": {
                    "type": "string",
                    "format": "email",
                    "description": "Recipient address, if known"
                }
            }
        })
    }

    async fn run(&self, arguments: Value, ctx: ToolContext) -> Result<String, ExecutionError> {
        let input: SaveInput = serde_json::from_value(arguments)
            .map_err(|e| ExecutionError::new(format!("Invalid input: {e}")))?;

        tracing::debug!(session_id = %ctx.session_id, call_id = %ctx.call_id, "Saving draft");
        self.mailbox
            .save_draft(OutgoingEmail {
                recipient: input.recipient,
                subject: input.subject,
                body: input.body,
            })
            .await;

        Ok("Draft email saved successfully!".to_string())
    }
}
