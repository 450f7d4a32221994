//! Retrieval boundary
//!
//! `search(query, k)` returns up to `k` documents ordered by relevance.
//! Zero matches is an empty result, never an error.

mod inbox;

pub use inbox::{Email, InboxIndex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use thiserror::Error;

/// A retrieved document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("failed to load documents: {0}")]
    Load(String),
}

/// Semantic (or lexical) document search
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, k: NonZeroUsize) -> Result<Vec<Document>, RetrievalError>;
}
