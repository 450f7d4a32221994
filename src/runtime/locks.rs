//! Per-session mutual exclusion
//!
//! Calls on one session id serialize; calls on different ids never contend
//! beyond the brief map lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Held for the duration of one submit/resume call
#[must_use = "the session is unlocked as soon as the guard is dropped"]
pub struct SessionGuard {
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionGuard {
    /// A guard that excludes nothing, for stores without locking
    pub fn unlocked() -> Self {
        Self { guard: None }
    }

    pub fn is_locked(&self) -> bool {
        self.guard.is_some()
    }
}

/// Lazily created async mutex per key
#[derive(Default)]
pub struct KeyedLocks {
    // Entries are never evicted
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> SessionGuard {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(key.to_string()).or_default().clone()
        };
        SessionGuard {
            guard: Some(lock.lock_owned().await),
        }
    }
}
