//! In-process inbox index
//!
//! Emails are indexed as `FROM/SUBJECT/BODY/DATE` documents and ranked by
//! how many query terms they contain.

use super::{Document, RetrievalError, Retriever};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroUsize;
use std::path::Path;
use tokio::sync::RwLock;

/// An email as it arrives from the mailbox export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub from: String,
    pub subject: String,
    pub body: String,
    pub date: String,
}

impl Email {
    fn to_document(&self) -> Document {
        let content = format!(
            "FROM: {}\nSUBJECT: {}\nBODY: {}\nDATE: {}",
            self.from, self.subject, self.body, self.date
        );
        let metadata = BTreeMap::from([
            ("from".to_string(), self.from.clone()),
            ("date".to_string(), self.date.clone()),
        ]);
        Document { content, metadata }
    }
}

struct Indexed {
    document: Document,
    terms: HashSet<String>,
}

/// Term-overlap index over emails
#[derive(Default)]
pub struct InboxIndex {
    entries: RwLock<Vec<Indexed>>,
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

impl InboxIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load emails from a JSON array file and index them
    pub async fn from_json_file(path: &Path) -> Result<Self, RetrievalError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RetrievalError::Load(format!("{}: {e}", path.display())))?;
        let emails: Vec<Email> = serde_json::from_str(&raw)
            .map_err(|e| RetrievalError::Load(format!("{}: {e}", path.display())))?;

        let index = Self::new();
        index.index_emails(&emails).await;
        Ok(index)
    }

    /// Add emails to the index, returning how many were indexed
    pub async fn index_emails(&self, emails: &[Email]) -> usize {
        if emails.is_empty() {
            tracing::warn!("No emails found to index");
            return 0;
        }

        let mut entries = self.entries.write().await;
        for email in emails {
            let document = email.to_document();
            let terms = tokenize(&document.content).collect();
            entries.push(Indexed { document, terms });
        }
        tracing::info!(added = emails.len(), total = entries.len(), "Indexed emails");
        emails.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Retriever for InboxIndex {
    async fn search(&self, query: &str, k: NonZeroUsize) -> Result<Vec<Document>, RetrievalError> {
        let query_terms: HashSet<String> = tokenize(query).collect();
        let entries = self.entries.read().await;

        let mut scored: Vec<(usize, usize)> = entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (idx, query_terms.intersection(&e.terms).count()))
            .filter(|(_, score)| *score > 0)
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k.get())
            .map(|(idx, _)| entries[idx].document.clone())
            .collect())
    }
}
