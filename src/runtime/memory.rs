//! In-memory session store
//!
//! Durable only for the life of the process. Interchangeable with the
//! database-backed store.

use super::locks::{KeyedLocks, SessionGuard};
use super::traits::{SessionStore, StoreError};
use crate::db::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct InMemoryStorage {
    sessions: Mutex<HashMap<String, Session>>,
    locks: KeyedLocks,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemoryStorage {
    async fn lock(&self, session_id: &str) -> SessionGuard {
        self.locks.acquire(session_id).await
    }

    async fn load(&self, session_id: &str) -> Result<Session, StoreError> {
        Ok(self
            .sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| Session::new(session_id)))
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }
}
