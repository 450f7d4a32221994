//! Send-email tool, registered only in send mode

use super::{ExecutionError, Tool, ToolContext};
use crate::mail::{Mailbox, MailTransport, OutgoingEmail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct SendEmailTool {
    transport: Arc<dyn MailTransport>,
}

impl SendEmailTool {
    pub fn new(mailbox: Arc<Mailbox>) -> Self {
        Self { transport: mailbox }
    }
}

#[derive(Debug, Deserialize)]
struct SendInput {
    recipient: String,
    subject: String,
    body: String,
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &'static str {
        "send_email"
    }

    fn description(&self) -> String {
        "Send an email. The user must approve the exact recipient, subject, and body first."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["recipient", "subject", "body"],
            "properties": {
                "recipient": {"type": "string", "format": "email", "description": "Recipient address"},
                "subject": {"type": "string", "description": "Subject line"},
                "body": {"type": "string", "description": "Full email body"}
            }
        })
    }

    async fn run(&self, arguments: Value, ctx: ToolContext) -> Result<String, ExecutionError> {
        let input: SendInput = serde_json::from_value(arguments)
            .map_err(|e| ExecutionError::new(format!("Invalid input: {e}")))?;

        let email = OutgoingEmail {
            recipient: Some(input.recipient.clone()),
            subject: input.subject,
            body: input.body,
        };
        self.transport
            .deliver(&email)
            .await
            .map_err(|e| ExecutionError::new(e.to_string()))?;

        tracing::info!(session_id = %ctx.session_id, recipient = %input.recipient, "Email sent");
        Ok(format!("Email sent to {}.", input.recipient))
    }
}
