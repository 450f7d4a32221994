//! Mock implementations for testing
//!
//! These mocks enable integration testing of whole turns without real I/O.

use super::locks::SessionGuard;
use super::traits::*;
use crate::db::Session;
use crate::llm::{ContentBlock, LlmError, LlmRequest, LlmResponse, Usage};
use crate::tools::{ExecutionError, Tool, ToolContext};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses, each after an optional delay
pub struct MockLlmClient {
    responses: Mutex<VecDeque<(Duration, Result<LlmResponse, LlmError>)>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_text(&self, text: &str) {
        self.queue_delayed_text(text, Duration::ZERO);
    }

    pub fn queue_delayed_text(&self, text: &str, delay: Duration) {
        let response = LlmResponse {
            content: vec![ContentBlock::text(text)],
            end_turn: true,
            usage: Usage::default(),
        };
        self.responses
            .lock()
            .unwrap()
            .push_back((delay, Ok(response)));
    }

    pub fn queue_tool_call(&self, id: &str, name: &str, input: Value) {
        self.queue_response(LlmResponse {
            content: vec![ContentBlock::tool_use(id, name, input)],
            end_turn: false,
            usage: Usage::default(),
        });
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses
            .lock()
            .unwrap()
            .push_back((Duration::ZERO, Ok(response)));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses
            .lock()
            .unwrap()
            .push_back((Duration::ZERO, Err(error)));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        let Some((delay, response)) = next else {
            return Err(LlmError::network("No mock response queued"));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Recording Tool
// ============================================================================

/// Tool that records every execution, optionally slowly or failing
pub struct RecordingTool {
    name: String,
    schema: Value,
    delay: Duration,
    failure: Option<String>,
    /// Arguments of every execution, in order
    pub calls: Mutex<Vec<Value>>,
}

impl RecordingTool {
    pub fn new(name: &str, schema: Value) -> Self {
        Self {
            name: name.to_string(),
            schema,
            delay: Duration::ZERO,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn recorded_calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Mock {}", self.name)
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn run(&self, arguments: Value, _ctx: ToolContext) -> Result<String, ExecutionError> {
        self.calls.lock().unwrap().push(arguments);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(ExecutionError::new(message.clone())),
            None => Ok(format!("{} done", self.name)),
        }
    }
}

// ============================================================================
// Store without session locking
// ============================================================================

/// Wraps a store but hands out guards that exclude nothing
pub struct UnlockedStore<S>(pub S);

#[async_trait]
impl<S: SessionStore> SessionStore for UnlockedStore<S> {
    async fn lock(&self, _session_id: &str) -> SessionGuard {
        SessionGuard::unlocked()
    }

    async fn load(&self, session_id: &str) -> Result<Session, StoreError> {
        self.0.load(session_id).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.0.save(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MessageContent};
    use crate::llm::MessageRole;
    use crate::policy::{Policy, SideEffectPolicy};
    use crate::runtime::{InMemoryStorage, TurnEngine, TurnError, TurnOutcome};
    use crate::state_machine::{
        Decision, DecisionAction, DecisionKind, ToolOutcome, REJECTION_SENTINEL,
    };
    use crate::tools::ToolRegistry;
    use serde_json::json;
    use std::sync::Arc;

    const SESSION: &str = "session-1";

    struct Harness<S: SessionStore> {
        engine: TurnEngine<S, Arc<MockLlmClient>>,
        llm: Arc<MockLlmClient>,
        lookup: Arc<RecordingTool>,
        send: Arc<RecordingTool>,
    }

    fn send_schema() -> Value {
        json!({
            "type": "object",
            "required": ["recipient", "subject", "body"],
            "properties": {
                "recipient": {"type": "string", "format": "email"},
                "subject": {"type": "string"},
                "body": {"type": "string"}
            }
        })
    }

    fn refund_args() -> Value {
        json!({"recipient": "a@b.com", "subject": "Refund Request", "body": "Generated body"})
    }

    fn harness_with<S: SessionStore>(
        store: S,
        send: RecordingTool,
        policy: Arc<dyn Policy>,
        max_tool_calls: u32,
    ) -> Harness<S> {
        let llm = Arc::new(MockLlmClient::new());
        let lookup = Arc::new(RecordingTool::new(
            "lookup",
            json!({
                "type": "object",
                "required": ["query"],
                "properties": {"query": {"type": "string"}}
            }),
        ));
        let send = Arc::new(send);

        let mut registry = ToolRegistry::new();
        registry.register(lookup.clone(), false).unwrap();
        registry.register(send.clone(), true).unwrap();

        let engine = TurnEngine::new(
            store,
            llm.clone(),
            Arc::new(registry),
            policy,
            "You are a test assistant.",
            max_tool_calls,
        );
        Harness {
            engine,
            llm,
            lookup,
            send,
        }
    }

    fn harness() -> Harness<InMemoryStorage> {
        harness_with(
            InMemoryStorage::new(),
            RecordingTool::new("send_email", send_schema()),
            Arc::new(SideEffectPolicy::new()),
            10,
        )
    }

    fn approve(target: &str) -> Decision {
        Decision {
            target_id: target.into(),
            action: DecisionAction::Approve,
        }
    }

    /// Submit a request the model answers with a gated send
    async fn suspend_on_send<S: SessionStore>(h: &Harness<S>) -> TurnOutcome {
        h.llm.queue_tool_call("call_send", "send_email", refund_args());
        h.engine
            .submit(SESSION, "send a refund email to a@b.com")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_plain_reply() {
        let h = harness();
        h.llm.queue_text("Hello!");

        let outcome = h.engine.submit(SESSION, "hi").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Reply { text: "Hello!".into() });

        let session = h.engine.session(SESSION).await.unwrap();
        assert_eq!(session.messages.len(), 2);
        assert!(session.pending_suspension.is_none());

        let request = &h.llm.recorded_requests()[0];
        assert_eq!(request.system[0].text, "You are a test assistant.");
        assert_eq!(request.tools.len(), 2);
    }

    #[tokio::test]
    async fn test_ungated_tool_runs_and_loops_back() {
        let h = harness();
        h.llm.queue_tool_call("call_1", "lookup", json!({"query": "refund"}));
        h.llm.queue_text("Found it.");

        let outcome = h.engine.submit(SESSION, "find the refund email").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Reply { text: "Found it.".into() });
        assert_eq!(h.lookup.call_count(), 1);

        // The second model call sees the tool result
        let second = &h.llm.recorded_requests()[1];
        let last = second.messages.last().unwrap();
        assert_eq!(last.role, MessageRole::User);
        assert!(matches!(
            &last.content[0],
            ContentBlock::ToolResult { tool_use_id, content, is_error: false }
                if tool_use_id == "call_1" && content == "lookup done"
        ));
    }

    #[tokio::test]
    async fn test_gated_tool_suspends_without_executing() {
        let h = harness();
        let outcome = suspend_on_send(&h).await;

        let TurnOutcome::Suspended { suspension } = outcome else {
            panic!("expected suspension, got {outcome:?}");
        };
        assert_eq!(suspension.id, "call_send");
        assert_eq!(suspension.request.arguments, refund_args());
        assert_eq!(suspension.allowed_decisions, DecisionKind::ALL.to_vec());
        assert_eq!(h.send.call_count(), 0);

        let session = h.engine.session(SESSION).await.unwrap();
        assert_eq!(session.pending_suspension, Some(suspension));
        assert!(matches!(
            &session.messages.last().unwrap().content,
            MessageContent::Agent(a) if a.tool_call.as_ref().map(|c| c.id.as_str()) == Some("call_send")
        ));
    }

    #[tokio::test]
    async fn test_submit_while_suspended_fails_unchanged() {
        let h = harness();
        suspend_on_send(&h).await;
        let before = h.engine.session(SESSION).await.unwrap();

        let err = h.engine.submit(SESSION, "never mind").await.unwrap_err();
        assert!(matches!(err, TurnError::SessionSuspended { ref suspension_id } if suspension_id == "call_send"));
        assert_eq!(h.engine.session(SESSION).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_approve_executes_exactly_once() {
        let h = harness();
        suspend_on_send(&h).await;
        h.llm.queue_text("Sent!");

        let outcome = h.engine.resume(SESSION, approve("call_send")).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Reply { text: "Sent!".into() });
        assert_eq!(h.send.recorded_calls(), vec![refund_args()]);

        let session = h.engine.session(SESSION).await.unwrap();
        assert!(session.pending_suspension.is_none());

        // Replaying the same decision is a protocol error and runs nothing
        let err = h.engine.resume(SESSION, approve("call_send")).await.unwrap_err();
        assert_eq!(err.kind(), "no_matching_suspension");
        assert_eq!(h.send.call_count(), 1);
    }

    #[tokio::test]
    async fn test_edit_runs_with_replacement_arguments() {
        let h = harness();
        suspend_on_send(&h).await;
        h.llm.queue_text("Sent with your changes.");

        let edited = json!({
            "recipient": "a@b.com",
            "subject": "Refund Request",
            "body": "Corrected body text"
        });
        h.engine
            .resume(
                SESSION,
                Decision {
                    target_id: "call_send".into(),
                    action: DecisionAction::Edit {
                        arguments: edited.clone(),
                    },
                },
            )
            .await
            .unwrap();

        let calls = h.send.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["body"], "Corrected body text");
        assert_eq!(calls[0], edited);
    }

    #[tokio::test]
    async fn test_invalid_edit_keeps_suspension() {
        let h = harness();
        suspend_on_send(&h).await;
        let before = h.engine.session(SESSION).await.unwrap();

        let err = h
            .engine
            .resume(
                SESSION,
                Decision {
                    target_id: "call_send".into(),
                    action: DecisionAction::Edit {
                        arguments: json!({"recipient": "not-an-address", "subject": "s", "body": "b"}),
                    },
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::Schema(ref e) if e.field == "recipient"));
        assert_eq!(h.send.call_count(), 0);
        assert_eq!(h.engine.session(SESSION).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_reject_records_sentinel_and_goes_idle() {
        let h = harness();
        suspend_on_send(&h).await;
        h.llm.queue_text("Okay, I won't send it.");

        let outcome = h
            .engine
            .resume(
                SESSION,
                Decision {
                    target_id: "call_send".into(),
                    action: DecisionAction::Reject { reason: None },
                },
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Reply {
                text: "Okay, I won't send it.".into()
            }
        );
        assert_eq!(h.send.call_count(), 0);

        let session = h.engine.session(SESSION).await.unwrap();
        assert!(session.pending_suspension.is_none());
        assert!(session.messages.iter().any(|m| matches!(
            &m.content,
            MessageContent::Tool(t) if t.tool_use_id == "call_send" && t.content == REJECTION_SENTINEL
        )));

        // Back to idle: a new message is accepted
        h.llm.queue_text("Sure.");
        assert!(h.engine.submit(SESSION, "thanks").await.is_ok());
    }

    #[tokio::test]
    async fn test_mismatched_decision_leaves_state_unchanged() {
        let h = harness();
        let idle_err = h.engine.resume(SESSION, approve("call_send")).await.unwrap_err();
        assert!(matches!(idle_err, TurnError::NoMatchingSuspension { .. }));

        suspend_on_send(&h).await;
        let before = h.engine.session(SESSION).await.unwrap();

        let err = h.engine.resume(SESSION, approve("call_other")).await.unwrap_err();
        assert!(matches!(err, TurnError::NoMatchingSuspension { ref target_id } if target_id == "call_other"));
        assert_eq!(h.engine.session(SESSION).await.unwrap(), before);
        assert_eq!(h.send.call_count(), 0);
    }

    #[tokio::test]
    async fn test_loop_limit_after_exact_bound() {
        let h = harness_with(
            InMemoryStorage::new(),
            RecordingTool::new("send_email", send_schema()),
            Arc::new(SideEffectPolicy::new()),
            3,
        );
        for i in 0..10 {
            h.llm
                .queue_tool_call(&format!("call_{i}"), "lookup", json!({"query": "again"}));
        }

        let err = h.engine.submit(SESSION, "loop forever").await.unwrap_err();
        assert!(matches!(err, TurnError::LoopLimitExceeded { limit: 3 }));
        assert_eq!(h.lookup.call_count(), 3);

        let session = h.engine.session(SESSION).await.unwrap();
        assert!(session.messages.is_empty());
        assert!(session.pending_suspension.is_none());
    }

    #[tokio::test]
    async fn test_model_failure_leaves_session_unchanged() {
        let h = harness();
        h.llm.queue_error(LlmError::server_error("overloaded"));

        let err = h.engine.submit(SESSION, "hi").await.unwrap_err();
        assert_eq!(err.kind(), "model_unavailable");
        assert!(h.engine.session(SESSION).await.unwrap().messages.is_empty());

        // Retrying is safe
        h.llm.queue_text("Hello!");
        assert!(h.engine.submit(SESSION, "hi").await.is_ok());
        assert_eq!(h.engine.session(SESSION).await.unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_during_resume_keeps_suspension() {
        let h = harness();
        suspend_on_send(&h).await;
        h.llm.queue_error(LlmError::network("connection reset"));

        let err = h.engine.resume(SESSION, approve("call_send")).await.unwrap_err();
        assert!(matches!(err, TurnError::ModelUnavailable(_)));
        assert_eq!(h.send.call_count(), 1);

        let session = h.engine.session(SESSION).await.unwrap();
        let pending = session.pending_suspension.unwrap();
        assert_eq!(pending.id, "call_send");
        assert_eq!(
            pending.executed,
            Some(ToolOutcome::success("call_send", "send_email done"))
        );
        // The failed model call appended nothing
        assert_eq!(session.messages.len(), 2);

        // Retrying replays the recorded result instead of sending again
        h.llm.queue_text("Sent!");
        let outcome = h.engine.resume(SESSION, approve("call_send")).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Reply { text: "Sent!".into() });
        assert_eq!(h.send.call_count(), 1);

        let session = h.engine.session(SESSION).await.unwrap();
        assert!(session.pending_suspension.is_none());
        let results: Vec<_> = session
            .messages
            .iter()
            .filter(|m| matches!(&m.content, MessageContent::Tool(t) if t.tool_use_id == "call_send"))
            .collect();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_rejecting_an_executed_call_is_refused() {
        let h = harness();
        suspend_on_send(&h).await;
        h.llm.queue_error(LlmError::network("connection reset"));
        h.engine.resume(SESSION, approve("call_send")).await.unwrap_err();

        let err = h
            .engine
            .resume(
                SESSION,
                Decision {
                    target_id: "call_send".into(),
                    action: DecisionAction::Reject { reason: None },
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::DecisionNotAllowed { decision: DecisionKind::Reject }));
        assert_eq!(h.send.call_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_failure_becomes_error_result() {
        let h = harness_with(
            InMemoryStorage::new(),
            RecordingTool::new("send_email", send_schema()).failing("smtp unreachable"),
            Arc::new(SideEffectPolicy::new()),
            10,
        );
        suspend_on_send(&h).await;
        h.llm.queue_text("Sending failed, sorry.");

        let outcome = h.engine.resume(SESSION, approve("call_send")).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Reply { .. }));
        assert_eq!(h.send.call_count(), 1);

        let session = h.engine.session(SESSION).await.unwrap();
        assert!(session.pending_suspension.is_none());
        assert!(session.messages.iter().any(|m| matches!(
            &m.content,
            MessageContent::Tool(t) if t.is_error && t.content == "smtp unreachable"
        )));
    }

    #[tokio::test]
    async fn test_invalid_model_request_fed_back() {
        let h = harness();
        h.llm.queue_tool_call("call_1", "teleport", json!({}));
        h.llm.queue_tool_call("call_2", "lookup", json!({"wrong": 1}));
        h.llm.queue_text("Let me try something else.");

        let outcome = h.engine.submit(SESSION, "do it").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Reply { .. }));
        assert_eq!(h.lookup.call_count(), 0);

        let session = h.engine.session(SESSION).await.unwrap();
        let errors: Vec<_> = session
            .messages
            .iter()
            .filter_map(|m| match &m.content {
                MessageContent::Tool(t) if t.is_error => Some(t.content.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            errors,
            vec![
                "unknown tool: teleport".to_string(),
                "invalid argument `query`: missing required field".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_approve_then_another_gated_call_suspends_again() {
        let h = harness();
        suspend_on_send(&h).await;
        h.llm.queue_tool_call("call_followup", "send_email", refund_args());

        let outcome = h.engine.resume(SESSION, approve("call_send")).await.unwrap();
        let TurnOutcome::Suspended { suspension } = outcome else {
            panic!("expected a second suspension");
        };
        assert_eq!(suspension.id, "call_followup");
        assert_eq!(h.send.call_count(), 1);
    }

    #[tokio::test]
    async fn test_non_editable_tool_refuses_edit() {
        let h = harness_with(
            InMemoryStorage::new(),
            RecordingTool::new("send_email", send_schema()),
            Arc::new(SideEffectPolicy::new().with_non_editable(["send_email".to_string()])),
            10,
        );
        let TurnOutcome::Suspended { suspension } = suspend_on_send(&h).await else {
            panic!("expected suspension");
        };
        assert!(!suspension.allows(DecisionKind::Edit));

        let err = h
            .engine
            .resume(
                SESSION,
                Decision {
                    target_id: "call_send".into(),
                    action: DecisionAction::Edit {
                        arguments: refund_args(),
                    },
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::DecisionNotAllowed { decision: DecisionKind::Edit }));
        assert_eq!(h.send.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resume_after_restart_with_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");

        {
            let h = harness_with(
                DatabaseStorage::new(Database::open(&path).unwrap()),
                RecordingTool::new("send_email", send_schema()),
                Arc::new(SideEffectPolicy::new()),
                10,
            );
            suspend_on_send(&h).await;
        }

        let h = harness_with(
            DatabaseStorage::new(Database::open(&path).unwrap()),
            RecordingTool::new("send_email", send_schema()),
            Arc::new(SideEffectPolicy::new()),
            10,
        );
        h.llm.queue_text("Sent!");
        let outcome = h.engine.resume(SESSION, approve("call_send")).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Reply { text: "Sent!".into() });
        assert_eq!(h.send.recorded_calls(), vec![refund_args()]);
    }

    #[tokio::test]
    async fn test_executed_call_survives_restart_without_resending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");

        {
            let h = harness_with(
                DatabaseStorage::new(Database::open(&path).unwrap()),
                RecordingTool::new("send_email", send_schema()),
                Arc::new(SideEffectPolicy::new()),
                10,
            );
            suspend_on_send(&h).await;
            h.llm.queue_error(LlmError::server_error("overloaded"));
            h.engine.resume(SESSION, approve("call_send")).await.unwrap_err();
            assert_eq!(h.send.call_count(), 1);
        }

        let h = harness_with(
            DatabaseStorage::new(Database::open(&path).unwrap()),
            RecordingTool::new("send_email", send_schema()),
            Arc::new(SideEffectPolicy::new()),
            10,
        );
        h.llm.queue_text("Sent!");
        let outcome = h.engine.resume(SESSION, approve("call_send")).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Reply { text: "Sent!".into() });
        assert_eq!(h.send.call_count(), 0);
    }

    async fn concurrent_approvals<S: SessionStore>(store: S) -> usize {
        let h = harness_with(
            store,
            RecordingTool::new("send_email", send_schema()).with_delay(Duration::from_millis(50)),
            Arc::new(SideEffectPolicy::new()),
            10,
        );
        suspend_on_send(&h).await;
        h.llm.queue_text("Sent!");
        h.llm.queue_text("Sent!");

        let (a, b) = tokio::join!(
            h.engine.resume(SESSION, approve("call_send")),
            h.engine.resume(SESSION, approve("call_send")),
        );
        let failures = [a, b].into_iter().filter(Result::is_err).count();
        tracing::debug!(failures, "concurrent approvals finished");
        h.send.call_count()
    }

    #[tokio::test]
    async fn test_session_lock_serializes_concurrent_approvals() {
        assert_eq!(concurrent_approvals(InMemoryStorage::new()).await, 1);
    }

    #[tokio::test]
    async fn test_without_session_lock_approvals_race() {
        // Both calls load the suspended session before either saves
        assert_eq!(
            concurrent_approvals(UnlockedStore(InMemoryStorage::new())).await,
            2
        );
    }

    /// Two concurrent submits, each looking something up before answering.
    /// Returns how many lookups ran and how many messages were persisted.
    async fn concurrent_submits<S: SessionStore>(store: S) -> (usize, usize) {
        let llm = Arc::new(MockLlmClient::new());
        let lookup = Arc::new(
            RecordingTool::new(
                "lookup",
                json!({
                    "type": "object",
                    "required": ["query"],
                    "properties": {"query": {"type": "string"}}
                }),
            )
            .with_delay(Duration::from_millis(50)),
        );
        let mut registry = ToolRegistry::new();
        registry.register(lookup.clone(), false).unwrap();
        let engine = TurnEngine::new(
            store,
            llm.clone(),
            Arc::new(registry),
            Arc::new(SideEffectPolicy::new()),
            "You are a test assistant.",
            10,
        );

        llm.queue_tool_call("call_1", "lookup", json!({"query": "refund"}));
        llm.queue_tool_call("call_2", "lookup", json!({"query": "invoice"}));
        llm.queue_text("Found it.");
        llm.queue_text("Found it.");

        let (a, b) = tokio::join!(
            engine.submit(SESSION, "find the refund email"),
            engine.submit(SESSION, "find the invoice email"),
        );
        assert!(a.is_ok() && b.is_ok(), "{a:?} {b:?}");

        let session = engine.session(SESSION).await.unwrap();
        (lookup.call_count(), session.messages.len())
    }

    #[tokio::test]
    async fn test_session_lock_serializes_concurrent_submits() {
        // Both turns land in history
        let (lookups, messages) = concurrent_submits(InMemoryStorage::new()).await;
        assert_eq!(lookups, 2);
        assert_eq!(messages, 8);
    }

    #[tokio::test]
    async fn test_without_session_lock_submits_lose_a_turn() {
        // Both turns start from the same empty session and the last save wins
        let (lookups, messages) =
            concurrent_submits(UnlockedStore(InMemoryStorage::new())).await;
        assert_eq!(lookups, 2);
        assert_eq!(messages, 4);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let h = harness();
        suspend_on_send(&h).await;

        h.llm.queue_text("Hi there.");
        let other = h.engine.submit("session-2", "hello").await.unwrap();
        assert!(matches!(other, TurnOutcome::Reply { .. }));
        assert!(h
            .engine
            .session(SESSION)
            .await
            .unwrap()
            .pending_suspension
            .is_some());
    }
}
