//! HTTP driver
//!
//! A thin JSON surface over the turn engine's `submit` and `resume`.

mod handlers;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::runtime::{LlmClient, SessionStore, TurnEngine};
use std::sync::Arc;
use std::time::Duration;

/// Engine with type-erased store and model client
pub type SharedEngine = TurnEngine<Arc<dyn SessionStore>, Arc<dyn LlmClient>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SharedEngine>,
    pub turn_timeout: Duration,
}

impl AppState {
    pub fn new(engine: SharedEngine, turn_timeout: Duration) -> Self {
        Self {
            engine: Arc::new(engine),
            turn_timeout,
        }
    }
}
