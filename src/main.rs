//! Mail Steward server

use mail_steward::api::{create_router, AppState, SharedEngine};
use mail_steward::config::Config;
use mail_steward::db::Database;
use mail_steward::llm::LlmService;
use mail_steward::mail::Mailbox;
use mail_steward::policy::SideEffectPolicy;
use mail_steward::retrieval::{InboxIndex, Retriever};
use mail_steward::runtime::{ConfiguredLlmClient, DatabaseStorage, LlmClient, SessionStore};
use mail_steward::system_prompt::build_system_prompt;
use mail_steward::tools::{EmailToolDeps, ToolRegistry};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mail_steward=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();

    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    let inbox = match &config.inbox_path {
        Some(path) => InboxIndex::from_json_file(path).await?,
        None => {
            tracing::warn!("MAIL_STEWARD_INBOX_PATH not set; inbox search will find nothing");
            InboxIndex::new()
        }
    };

    let llm = Arc::new(ConfiguredLlmClient::new(config.llm.build_service()));
    if llm.is_configured() {
        tracing::info!(model = %config.llm.model_name(), "LLM client initialized");
    } else {
        tracing::warn!("No LLM API key configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY.");
    }

    let retriever: Arc<dyn Retriever> = Arc::new(inbox);
    let drafter: Arc<dyn LlmService> = llm.clone();
    let deps = EmailToolDeps {
        retriever,
        drafter,
        mailbox: Arc::new(Mailbox::new()),
    };
    let tools = ToolRegistry::email_assistant(config.mode, &deps, &config.gated_tools)?;
    tracing::info!(
        mode = ?config.mode,
        tools = ?tools.iter().map(|t| t.name().to_string()).collect::<Vec<_>>(),
        gated = ?config.gated_tools,
        "Tool registry initialized"
    );

    let policy = SideEffectPolicy::new().with_non_editable(config.uneditable_tools.iter().cloned());
    let store: Arc<dyn SessionStore> = Arc::new(DatabaseStorage::new(db));
    let client: Arc<dyn LlmClient> = llm;
    let engine: SharedEngine = SharedEngine::new(
        store,
        client,
        Arc::new(tools),
        Arc::new(policy),
        build_system_prompt(config.mode),
        config.max_tool_calls,
    );
    let state = AppState::new(engine, config.turn_timeout);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Mail Steward listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
