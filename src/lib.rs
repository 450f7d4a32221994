//! Mail Steward: an email-drafting agent with human review of side effects
//!
//! A turn runs the model in a loop, executing tools it requests. Tools
//! marked side-effecting suspend the turn until a person approves, edits,
//! or rejects the call; the session then resumes exactly where it stopped.

pub mod api;
pub mod config;
pub mod db;
pub mod llm;
pub mod mail;
pub mod policy;
pub mod retrieval;
pub mod runtime;
pub mod state_machine;
pub mod system_prompt;
pub mod tools;
