//! Inbox search tool

use super::{ExecutionError, Tool, ToolContext};
use crate::retrieval::Retriever;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroUsize;
use std::sync::Arc;

const RESULTS_PER_SEARCH: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(k) => k,
    None => unreachable!(),
};

/// Searches indexed emails for context relevant to a request
pub struct SearchInboxTool {
    retriever: Arc<dyn Retriever>,
}

impl SearchInboxTool {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self { retriever }
    }
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
}

#[async_trait]
impl Tool for SearchInboxTool {
    fn name(&self) -> &'static str {
        "search_inbox"
    }

    fn description(&self) -> String {
        "Search the user's inbox for emails relevant to a query. Use this to find prior \
         conversations, names, dates, and details before drafting a reply."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {"type": "string", "description": "What to search for"}
            }
        })
    }

    async fn run(&self, arguments: Value, _ctx: ToolContext) -> Result<String, ExecutionError> {
        let input: SearchInput = serde_json::from_value(arguments)
            .map_err(|e| ExecutionError::new(format!("Invalid input: {e}")))?;

        let documents = self
            .retriever
            .search(&input.query, RESULTS_PER_SEARCH)
            .await
            .map_err(|e| ExecutionError::new(e.to_string()))?;

        if documents.is_empty() {
            return Ok("No relevant emails found.".to_string());
        }

        Ok(documents
            .iter()
            .enumerate()
            .map(|(i, doc)| format!("Email {}:\n{}", i + 1, doc.content))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
