//! HTTP request handlers

use super::types::{
    ErrorResponse, MessageRequest, OutcomeResponse, ResumeRequest, SessionResponse, ToolInfo,
    ToolsResponse,
};
use super::AppState;
use crate::runtime::{TurnError, TurnOutcome};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use std::time::Duration;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/messages", post(submit_message))
        .route("/api/sessions/:id/resume", post(resume_session))
        .route("/api/tools", get(list_tools))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Turns
// ============================================================

async fn submit_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<OutcomeResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }
    let outcome = with_timeout(state.turn_timeout, state.engine.submit(&id, &req.text)).await?;
    Ok(Json(outcome.into()))
}

async fn resume_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<OutcomeResponse>, AppError> {
    let decision = req.into_decision().map_err(AppError::BadRequest)?;
    let outcome = with_timeout(state.turn_timeout, state.engine.resume(&id, decision)).await?;
    Ok(Json(outcome.into()))
}

/// Dropping the turn future on timeout discards its working copy. Only a
/// reviewed call that already ran stays recorded on the suspension.
async fn with_timeout(
    limit: Duration,
    turn: impl Future<Output = Result<TurnOutcome, TurnError>>,
) -> Result<TurnOutcome, AppError> {
    match tokio::time::timeout(limit, turn).await {
        Ok(result) => result.map_err(AppError::Turn),
        Err(_) => {
            tracing::warn!(timeout_secs = limit.as_secs_f64(), "Turn timed out");
            Err(AppError::Timeout(limit))
        }
    }
}

// ============================================================
// Queries
// ============================================================

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.engine.session(&id).await.map_err(AppError::Turn)?;
    Ok(Json(SessionResponse {
        session_id: session.session_id,
        messages: session.messages,
        pending_suspension: session.pending_suspension.map(Into::into),
    }))
}

async fn list_tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    let tools = state
        .engine
        .tools()
        .iter()
        .map(|def| {
            let definition = def.definition();
            ToolInfo {
                name: definition.name,
                description: definition.description,
                side_effecting: def.side_effecting(),
                input_schema: definition.input_schema,
            }
        })
        .collect();
    Json(ToolsResponse { tools })
}

async fn get_version() -> &'static str {
    concat!("mail-steward ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Errors
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Timeout(Duration),
    Turn(TurnError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Turn(e) => match e {
                TurnError::NoMatchingSuspension { .. }
                | TurnError::SessionSuspended { .. }
                | TurnError::DecisionNotAllowed { .. } => StatusCode::CONFLICT,
                TurnError::Schema(_) | TurnError::UnknownTool(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                TurnError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                TurnError::LoopLimitExceeded { .. }
                | TurnError::Store(_)
                | TurnError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::BadRequest(msg) => ErrorResponse::new(msg, "bad_request"),
            AppError::Timeout(limit) => ErrorResponse::new(
                format!("Turn exceeded {}s", limit.as_secs()),
                "timeout",
            ),
            AppError::Turn(e) => ErrorResponse::new(e.to_string(), e.kind()),
        };
        (status, Json(body)).into_response()
    }
}
