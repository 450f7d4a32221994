//! Process configuration from environment variables

use crate::llm::LlmConfig;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Whether the assistant may only save drafts or may also send mail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    #[default]
    Draft,
    Send,
}

impl DeliveryMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(DeliveryMode::Draft),
            "send" => Some(DeliveryMode::Send),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub port: u16,
    pub mode: DeliveryMode,
    /// Tools that suspend for human review
    pub gated_tools: HashSet<String>,
    /// Gated tools whose arguments may not be edited, only approved or rejected
    pub uneditable_tools: HashSet<String>,
    /// Tool invocations allowed per turn
    pub max_tool_calls: u32,
    pub turn_timeout: Duration,
    /// JSON file of emails to index at startup
    pub inbox_path: Option<PathBuf>,
    pub llm: LlmConfig,
}

fn name_set(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = var("MAIL_STEWARD_DB_PATH").unwrap_or_else(|| {
            let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.mail-steward/sessions.db")
        });

        let port = var("MAIL_STEWARD_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        let mode = match var("MAIL_STEWARD_MODE") {
            Some(raw) => DeliveryMode::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Unknown MAIL_STEWARD_MODE, using draft");
                DeliveryMode::Draft
            }),
            None => DeliveryMode::Draft,
        };

        let gated_tools = var("MAIL_STEWARD_GATED_TOOLS")
            .map_or_else(|| name_set("save_draft,send_email"), |raw| name_set(&raw));
        let uneditable_tools = var("MAIL_STEWARD_UNEDITABLE_TOOLS")
            .map(|raw| name_set(&raw))
            .unwrap_or_default();

        let max_tool_calls = var("MAIL_STEWARD_MAX_TOOL_CALLS")
            .and_then(|v| v.parse().ok())
            .filter(|&n: &u32| n > 0)
            .unwrap_or(10);

        let turn_timeout = Duration::from_secs(
            var("MAIL_STEWARD_TURN_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        );

        let llm = LlmConfig {
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            gateway: var("LLM_GATEWAY"),
            model: var("MAIL_STEWARD_MODEL"),
        };

        Self {
            db_path,
            port,
            mode,
            gated_tools,
            uneditable_tools,
            max_tool_calls,
            turn_timeout,
            inbox_path: var("MAIL_STEWARD_INBOX_PATH").map(PathBuf::from),
            llm,
        }
    }
}
