//! Turn engine
//!
//! Drives one turn: feeds events through the pure transition function and
//! carries out the resulting effects until the turn replies or suspends.
//! Works on a copy of the session that is saved only when the turn ends
//! cleanly, so a failed or abandoned turn leaves no trace. The one
//! exception is a reviewed call: its result is saved onto the suspension
//! as soon as it runs, so a retried resume never runs it twice.

use super::traits::{LlmClient, SessionStore, StoreError};
use crate::db::{MessageContent, Session};
use crate::llm::{ContentBlock, LlmError, LlmMessage, LlmRequest, MessageRole, ModelOutput, SystemContent};
use crate::policy::{GateVerdict, Policy, PolicyInput};
use crate::state_machine::{
    transition, Decision, DecisionAction, DecisionKind, Effect, Event, Suspension,
    ToolInvocationRequest, ToolOutcome, TransitionError, TurnContext, Verdict,
};
use crate::tools::{SchemaError, ToolContext, ToolError, ToolRegistry};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

const MODEL_MAX_TOKENS: u32 = 4096;

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Reply { text: String },
    Suspended { suspension: Suspension },
}

/// Errors surfaced to the driver. None of them leave a partial write.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[source] LlmError),
    #[error("Exceeded {limit} tool calls in one turn")]
    LoopLimitExceeded { limit: u32 },
    #[error("No pending suspension matches {target_id}")]
    NoMatchingSuspension { target_id: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Session is suspended awaiting a decision on {suspension_id}")]
    SessionSuspended { suspension_id: String },
    #[error("Decision `{decision}` is not allowed for this suspension")]
    DecisionNotAllowed { decision: DecisionKind },
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TurnError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::ModelUnavailable(_) => "model_unavailable",
            TurnError::LoopLimitExceeded { .. } => "loop_limit_exceeded",
            TurnError::NoMatchingSuspension { .. } => "no_matching_suspension",
            TurnError::Schema(_) => "schema_error",
            TurnError::SessionSuspended { .. } => "session_suspended",
            TurnError::DecisionNotAllowed { .. } => "decision_not_allowed",
            TurnError::UnknownTool(_) => "unknown_tool",
            TurnError::Store(_) => "store_error",
            TurnError::Internal(_) => "internal_error",
        }
    }
}

impl From<TransitionError> for TurnError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::SessionSuspended { suspension_id } => {
                TurnError::SessionSuspended { suspension_id }
            }
            TransitionError::NoMatchingSuspension { target_id } => {
                TurnError::NoMatchingSuspension { target_id }
            }
            TransitionError::DecisionNotAllowed { decision } => {
                TurnError::DecisionNotAllowed { decision }
            }
            TransitionError::LoopLimitExceeded { limit } => TurnError::LoopLimitExceeded { limit },
            TransitionError::InvalidTransition(msg) => TurnError::Internal(msg),
        }
    }
}

impl From<ToolError> for TurnError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::Schema(e) => TurnError::Schema(e),
            ToolError::NotFound(name) | ToolError::Duplicate(name) => TurnError::UnknownTool(name),
            e @ ToolError::InvalidSchema { .. } => TurnError::Internal(e.to_string()),
        }
    }
}

/// Runs turns against a store, a model, a tool registry, and a policy
pub struct TurnEngine<S, L>
where
    S: SessionStore,
    L: LlmClient,
{
    store: S,
    llm: L,
    tools: Arc<ToolRegistry>,
    policy: Arc<dyn Policy>,
    system_prompt: String,
    max_tool_calls: u32,
}

impl<S, L> TurnEngine<S, L>
where
    S: SessionStore,
    L: LlmClient,
{
    pub fn new(
        store: S,
        llm: L,
        tools: Arc<ToolRegistry>,
        policy: Arc<dyn Policy>,
        system_prompt: impl Into<String>,
        max_tool_calls: u32,
    ) -> Self {
        Self {
            store,
            llm,
            tools,
            policy,
            system_prompt: system_prompt.into(),
            max_tool_calls,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current persisted view of a session
    pub async fn session(&self, session_id: &str) -> Result<Session, TurnError> {
        Ok(self.store.load(session_id).await?)
    }

    /// Start a turn with a user message. Valid only while idle.
    pub async fn submit(&self, session_id: &str, text: &str) -> Result<TurnOutcome, TurnError> {
        let _guard = self.store.lock(session_id).await;
        let mut session = self.store.load(session_id).await?;

        tracing::info!(session_id = %session_id, "Turn started (submit)");
        let outcome = self
            .run_turn(
                &mut session,
                Event::UserMessage {
                    text: text.to_string(),
                },
            )
            .await;

        self.finish(session, outcome).await
    }

    /// Resume a suspended turn with a human decision
    pub async fn resume(
        &self,
        session_id: &str,
        decision: Decision,
    ) -> Result<TurnOutcome, TurnError> {
        let _guard = self.store.lock(session_id).await;
        let mut session = self.store.load(session_id).await?;

        tracing::info!(
            session_id = %session_id,
            target_id = %decision.target_id,
            decision = %decision.action.kind(),
            "Turn started (resume)"
        );
        let decision = self.sanitize_edit(session.pending_suspension.as_ref(), decision)?;
        let outcome = self.run_turn(&mut session, Event::Decision(decision)).await;

        self.finish(session, outcome).await
    }

    async fn finish(
        &self,
        session: Session,
        outcome: Result<TurnOutcome, TurnError>,
    ) -> Result<TurnOutcome, TurnError> {
        match outcome {
            Ok(outcome) => {
                self.store.save(&session).await?;
                match &outcome {
                    TurnOutcome::Reply { .. } => {
                        tracing::info!(session_id = %session.session_id, "Turn ended with reply");
                    }
                    TurnOutcome::Suspended { suspension } => tracing::info!(
                        session_id = %session.session_id,
                        suspension_id = %suspension.id,
                        tool = %suspension.request.name,
                        "Turn suspended for review"
                    ),
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    kind = e.kind(),
                    error = %e,
                    "Turn failed; session left unchanged"
                );
                Err(e)
            }
        }
    }

    /// Re-validate edited arguments against the suspended tool's schema.
    ///
    /// Only applies when the decision targets the pending suspension and
    /// edits are allowed; otherwise the transition reports the error.
    fn sanitize_edit(
        &self,
        pending: Option<&Suspension>,
        decision: Decision,
    ) -> Result<Decision, TurnError> {
        let (target_id, arguments) = match decision {
            Decision {
                target_id,
                action: DecisionAction::Edit { arguments },
            } => (target_id, arguments),
            other => return Ok(other),
        };

        let arguments = match pending {
            Some(s) if s.id == target_id && s.allows(DecisionKind::Edit) => {
                self.tools.validate(&s.request.name, &arguments)?
            }
            _ => arguments,
        };

        Ok(Decision {
            target_id,
            action: DecisionAction::Edit { arguments },
        })
    }

    async fn run_turn(&self, session: &mut Session, first: Event) -> Result<TurnOutcome, TurnError> {
        let context = TurnContext::new(session.session_id.clone(), self.max_tool_calls);
        let mut state = session.state();
        let mut next = Some(first);

        while let Some(event) = next.take() {
            let result = transition(&state, &context, event)?;
            state = result.new_state;

            for effect in result.effects {
                match effect {
                    Effect::AppendMessage(content) => {
                        session.append(content);
                    }
                    Effect::RequestModel => {
                        next = Some(self.request_model(session).await?);
                    }
                    Effect::ExecuteTool { request } => {
                        let result = self.execute_tool(&context, request).await;
                        self.record_reviewed(session, &result).await?;
                        next = Some(Event::ToolComplete { result });
                    }
                    Effect::Reply { text } => {
                        session.pending_suspension = None;
                        return Ok(TurnOutcome::Reply { text });
                    }
                    Effect::Suspend { suspension } => {
                        session.pending_suspension = Some(suspension.clone());
                        return Ok(TurnOutcome::Suspended { suspension });
                    }
                }
            }
        }

        Err(TurnError::Internal(format!(
            "Turn stopped without an outcome in state {state:?}"
        )))
    }

    async fn request_model(&self, session: &Session) -> Result<Event, TurnError> {
        let request = LlmRequest {
            system: vec![SystemContent::cached(&self.system_prompt)],
            messages: build_llm_messages(session),
            tools: self.tools.definitions(),
            max_tokens: Some(MODEL_MAX_TOKENS),
        };

        let response = self
            .llm
            .complete(&request)
            .await
            .map_err(TurnError::ModelUnavailable)?;

        Ok(match response.into_output() {
            ModelOutput::Text(text) => Event::ModelText { text },
            ModelOutput::ToolCall {
                id,
                name,
                arguments,
                text,
            } => {
                let (request, verdict) =
                    self.judge(ToolInvocationRequest::new(id, name, arguments), session);
                tracing::debug!(tool = %request.name, call_id = %request.id, ?verdict, "Tool requested");
                Event::ToolRequested {
                    request,
                    text,
                    verdict,
                    requested_at: Utc::now(),
                }
            }
        })
    }

    /// Validate a request and consult the policy gate
    fn judge(
        &self,
        request: ToolInvocationRequest,
        session: &Session,
    ) -> (ToolInvocationRequest, Verdict) {
        let def = match self.tools.get(&request.name) {
            Ok(def) => def,
            Err(e) => return (request, Verdict::Invalid(e.to_string())),
        };
        let arguments = match def.schema().validate(&request.arguments) {
            Ok(args) => args,
            Err(e) => return (request, Verdict::Invalid(e.to_string())),
        };
        let request = request.with_arguments(arguments);

        let verdict = match self.policy.evaluate(PolicyInput {
            request: &request,
            side_effecting: def.side_effecting(),
            history: &session.messages,
        }) {
            GateVerdict::Proceed => Verdict::Proceed,
            GateVerdict::Block(allowed) if allowed.is_empty() => {
                tracing::warn!(tool = %request.name, "Policy blocked with no decisions; allowing reject");
                Verdict::Block(vec![DecisionKind::Reject])
            }
            GateVerdict::Block(allowed) => Verdict::Block(allowed),
        };
        (request, verdict)
    }

    /// Checkpoint the result of a call that ran under a human decision
    async fn record_reviewed(
        &self,
        session: &mut Session,
        result: &ToolOutcome,
    ) -> Result<(), TurnError> {
        let Some(suspension) = session
            .pending_suspension
            .as_mut()
            .filter(|s| s.id == result.tool_use_id)
        else {
            return Ok(());
        };
        suspension.executed = Some(result.clone());
        self.store.save(session).await?;
        tracing::debug!(
            session_id = %session.session_id,
            suspension_id = %result.tool_use_id,
            "Recorded reviewed tool result"
        );
        Ok(())
    }

    async fn execute_tool(&self, context: &TurnContext, request: ToolInvocationRequest) -> ToolOutcome {
        let ctx = ToolContext::new(context.session_id.clone(), request.id.clone());
        match self
            .tools
            .execute(&request.name, request.arguments, ctx)
            .await
        {
            Ok(output) => ToolOutcome::success(request.id, output),
            Err(e) => {
                tracing::warn!(tool = %request.name, error = %e, "Tool execution failed");
                ToolOutcome::error(request.id, e.message)
            }
        }
    }
}

/// Convert session history into model messages.
///
/// Consecutive messages with the same role are merged, since tool results
/// travel as user content.
pub fn build_llm_messages(session: &Session) -> Vec<LlmMessage> {
    let mut messages: Vec<LlmMessage> = Vec::new();

    for msg in &session.messages {
        let (role, content) = match &msg.content {
            MessageContent::User(user) => (MessageRole::User, vec![ContentBlock::text(&user.text)]),
            MessageContent::Agent(agent) => {
                let mut blocks = Vec::new();
                if !agent.text.is_empty() {
                    blocks.push(ContentBlock::text(&agent.text));
                }
                if let Some(call) = &agent.tool_call {
                    blocks.push(ContentBlock::tool_use(&call.id, &call.name, call.arguments.clone()));
                }
                (MessageRole::Assistant, blocks)
            }
            MessageContent::Tool(tool) => (
                MessageRole::User,
                vec![ContentBlock::tool_result(
                    &tool.tool_use_id,
                    &tool.content,
                    tool.is_error,
                )],
            ),
        };

        if content.is_empty() {
            continue;
        }
        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(content),
            _ => messages.push(LlmMessage { role, content }),
        }
    }

    messages
}
