//! Runtime for executing turns
//!
//! The engine is generic over its store and model client so tests can
//! swap in mocks. The HTTP driver erases both behind `Arc<dyn _>`.

mod executor;
mod locks;
mod memory;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{build_llm_messages, TurnEngine, TurnError, TurnOutcome};
pub use locks::{KeyedLocks, SessionGuard};
pub use memory::InMemoryStorage;
pub use traits::*;
