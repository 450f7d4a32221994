//! Trait abstractions for runtime I/O
//!
//! These traits let the turn engine run against mock implementations.

use super::locks::{KeyedLocks, SessionGuard};
use crate::db::{Database, DbError, Session};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Store error: {0}")]
    Other(String),
}

/// Durable, keyed-by-session record of history and pending suspension
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Take the per-session lock. Held for a whole submit/resume call.
    async fn lock(&self, session_id: &str) -> SessionGuard;

    /// Load a session; unknown ids yield a fresh session
    async fn load(&self, session_id: &str) -> Result<Session, StoreError>;

    /// Full-session upsert, atomic per call
    async fn save(&self, session: &Session) -> Result<(), StoreError>;
}

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn lock(&self, session_id: &str) -> SessionGuard {
        (**self).lock(session_id).await
    }

    async fn load(&self, session_id: &str) -> Result<Session, StoreError> {
        (**self).load(session_id).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        (**self).save(session).await
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a SessionStore
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
    locks: Arc<KeyedLocks>,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn lock(&self, session_id: &str) -> SessionGuard {
        self.locks.acquire(session_id).await
    }

    async fn load(&self, session_id: &str) -> Result<Session, StoreError> {
        Ok(self.db.load_session(session_id)?)
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        Ok(self.db.save_session(session)?)
    }
}

/// Adapter over the configured LLM service, which may be absent
pub struct ConfiguredLlmClient {
    service: Option<Arc<dyn LlmService>>,
    model_id: String,
}

impl ConfiguredLlmClient {
    pub fn new(service: Option<Arc<dyn LlmService>>) -> Self {
        let model_id = service
            .as_ref()
            .map_or_else(|| "unconfigured".to_string(), |s| s.model_id().to_string());
        Self { service, model_id }
    }

    pub fn is_configured(&self) -> bool {
        self.service.is_some()
    }
}

#[async_trait]
impl LlmClient for ConfiguredLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let llm = self
            .service
            .as_ref()
            .ok_or_else(|| LlmError::network("No LLM available"))?;
        llm.complete(request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Lets tools that call the model share the same possibly-absent service
#[async_trait]
impl LlmService for ConfiguredLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        LlmClient::complete(self, request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
