//! Provider configuration

use super::{AnthropicService, LlmService, LoggingService};
use std::sync::Arc;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Configuration for the LLM provider
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    /// Gateway base URL; when set, requests go through it with an implicit key
    pub gateway: Option<String>,
    /// Provider model name
    pub model: Option<String>,
}

impl LlmConfig {
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Build the configured service, wrapped for logging.
    ///
    /// Returns `None` when no credentials are available; callers surface
    /// that as an unavailable model rather than failing at startup.
    pub fn build_service(&self) -> Option<Arc<dyn LlmService>> {
        let api_key = if self.gateway.is_some() {
            "implicit".to_string()
        } else {
            self.anthropic_api_key.clone().filter(|k| !k.is_empty())?
        };

        match AnthropicService::new(api_key, self.model_name(), self.gateway.as_deref()) {
            Ok(service) => Some(Arc::new(LoggingService::new(Arc::new(service)))),
            Err(e) => {
                tracing::error!(error = %e, "Failed to build LLM client");
                None
            }
        }
    }
}
