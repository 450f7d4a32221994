//! Mail transport stub and draft box
//!
//! Nothing leaves the process: sent mail lands in an in-memory outbox and
//! is logged. Swapping in a real transport means implementing
//! [`MailTransport`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// An outgoing email or saved draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub recipient: Option<String>,
    pub subject: String,
    pub body: String,
}

/// A delivered (or saved) email with its timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEmail {
    pub email: OutgoingEmail,
    pub at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
#[error("mail transport failed: {0}")]
pub struct TransportError(pub String);

/// Email delivery
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<(), TransportError>;
}

/// Draft box plus a stub outbox
#[derive(Default)]
pub struct Mailbox {
    drafts: Mutex<Vec<StoredEmail>>,
    outbox: Mutex<Vec<StoredEmail>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save_draft(&self, email: OutgoingEmail) {
        tracing::info!(subject = %email.subject, recipient = ?email.recipient, "Draft saved");
        self.drafts.lock().await.push(StoredEmail { email, at: Utc::now() });
    }

    pub async fn drafts(&self) -> Vec<StoredEmail> {
        self.drafts.lock().await.clone()
    }

    pub async fn sent(&self) -> Vec<StoredEmail> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl MailTransport for Mailbox {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<(), TransportError> {
        if email.recipient.is_none() {
            return Err(TransportError("no recipient".to_string()));
        }
        tracing::info!(
            recipient = ?email.recipient,
            subject = %email.subject,
            "Email handed to stub transport"
        );
        self.outbox.lock().await.push(StoredEmail {
            email: email.clone(),
            at: Utc::now(),
        });
        Ok(())
    }
}
