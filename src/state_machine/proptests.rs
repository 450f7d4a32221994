//! Property-based tests for the turn state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::event::{Decision, DecisionAction, ToolOutcome, Verdict};
use super::state::*;
use super::transition::*;
use super::*;
use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;

const MAX_TOOL_CALLS: u32 = 4;

fn test_context() -> TurnContext {
    TurnContext::new("test-session", MAX_TOOL_CALLS)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_call_id() -> impl Strategy<Value = String> {
    prop_oneof![Just("call_a".to_string()), Just("call_b".to_string()), "[a-z]{6}"]
}

fn arb_request() -> impl Strategy<Value = ToolInvocationRequest> {
    (
        arb_call_id(),
        prop_oneof![Just("search_inbox"), Just("save_draft"), Just("send_email")],
        "[a-zA-Z ]{0,20}",
    )
        .prop_map(|(id, name, body)| ToolInvocationRequest::new(id, name, json!({"body": body})))
}

fn arb_decision_kinds() -> impl Strategy<Value = Vec<DecisionKind>> {
    proptest::sample::subsequence(DecisionKind::ALL.to_vec(), 1..=3)
}

fn arb_verdict() -> impl Strategy<Value = Verdict> {
    prop_oneof![
        Just(Verdict::Proceed),
        "[a-z ]{1,20}".prop_map(Verdict::Invalid),
        arb_decision_kinds().prop_map(Verdict::Block),
    ]
}

fn arb_action() -> impl Strategy<Value = DecisionAction> {
    prop_oneof![
        Just(DecisionAction::Approve),
        proptest::option::of("[a-z ]{1,20}").prop_map(|reason| DecisionAction::Reject { reason }),
        "[a-zA-Z ]{0,20}".prop_map(|body| DecisionAction::Edit {
            arguments: json!({"body": body})
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-zA-Z ]{1,30}".prop_map(|text| Event::UserMessage { text }),
        "[a-zA-Z ]{0,30}".prop_map(|text| Event::ModelText { text }),
        (arb_request(), "[a-zA-Z ]{0,20}", arb_verdict()).prop_map(|(request, text, verdict)| {
            Event::ToolRequested {
                request,
                text,
                verdict,
                requested_at: Utc::now(),
            }
        }),
        (arb_call_id(), "[a-zA-Z ]{0,20}", any::<bool>()).prop_map(|(id, content, is_error)| {
            Event::ToolComplete {
                result: ToolOutcome {
                    tool_use_id: id,
                    content,
                    is_error,
                },
            }
        }),
        (arb_call_id(), arb_action()).prop_map(|(target_id, action)| {
            Event::Decision(Decision { target_id, action })
        }),
    ]
}

fn arb_suspension() -> impl Strategy<Value = Suspension> {
    (arb_request(), arb_decision_kinds()).prop_map(|(request, allowed_decisions)| Suspension {
        id: request.id.clone(),
        request,
        allowed_decisions,
        created_at: Utc::now(),
        executed: None,
    })
}

// ============================================================================
// Invariant Checks
// ============================================================================

fn effects_are_valid(effects: &[Effect], state: &TurnState) -> bool {
    let executes = effects
        .iter()
        .filter(|e| matches!(e, Effect::ExecuteTool { .. }))
        .count();
    let suspends = effects
        .iter()
        .filter(|e| matches!(e, Effect::Suspend { .. }))
        .count();

    // Never both execute and suspend in one step; at most one of each
    if executes > 1 || suspends > 1 || (executes == 1 && suspends == 1) {
        return false;
    }

    match state {
        TurnState::Suspended(s) => {
            suspends == 1
                && effects
                    .iter()
                    .any(|e| matches!(e, Effect::Suspend { suspension } if suspension == s))
        }
        TurnState::ExecutingTool { request, .. } => {
            executes == 1
                && effects
                    .iter()
                    .any(|e| matches!(e, Effect::ExecuteTool { request: r } if r == request))
        }
        TurnState::AwaitingModel { .. } => effects.last() == Some(&Effect::RequestModel),
        TurnState::Idle => matches!(effects.last(), Some(Effect::Reply { .. })),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Every accepted transition yields effects consistent with the new state
    #[test]
    fn prop_transitions_keep_effects_consistent(
        events in proptest::collection::vec(arb_event(), 0..30)
    ) {
        let mut state = TurnState::Idle;
        let ctx = test_context();

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                prop_assert!(
                    effects_are_valid(&result.effects, &result.new_state),
                    "Invalid effects for state {:?}: {:?}",
                    result.new_state,
                    result.effects
                );
                state = result.new_state;
            }
        }
    }

    // The tool-call counter never passes the configured bound
    #[test]
    fn prop_tool_calls_bounded(events in proptest::collection::vec(arb_event(), 0..60)) {
        let mut state = TurnState::Idle;
        let ctx = test_context();

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
            if let TurnState::AwaitingModel { tool_calls }
            | TurnState::ExecutingTool { tool_calls, .. } = &state
            {
                prop_assert!(*tool_calls <= MAX_TOOL_CALLS);
            }
        }
    }

    // A blocked request never executes in the same step
    #[test]
    fn prop_block_never_executes(
        tool_calls in 0u32..=MAX_TOOL_CALLS,
        request in arb_request(),
        allowed in arb_decision_kinds()
    ) {
        let event = Event::ToolRequested {
            request: request.clone(),
            text: String::new(),
            verdict: Verdict::Block(allowed.clone()),
            requested_at: Utc::now(),
        };
        let result = transition(&TurnState::AwaitingModel { tool_calls }, &test_context(), event)
            .expect("block is always accepted while awaiting the model");

        prop_assert!(!result.effects.iter().any(|e| matches!(e, Effect::ExecuteTool { .. })), "blocked request must not execute a tool");
        let TurnState::Suspended(s) = result.new_state else {
            return Err(TestCaseError::fail("expected Suspended"));
        };
        prop_assert_eq!(s.id, request.id.clone());
        prop_assert_eq!(s.request, request);
        prop_assert_eq!(s.allowed_decisions, allowed);
    }

    // Any decision whose target differs from the suspension id fails
    #[test]
    fn prop_mismatched_decision_rejected(
        suspension in arb_suspension(),
        target in "[A-Z]{6}",
        action in arb_action()
    ) {
        let state = TurnState::Suspended(suspension);
        let event = Event::Decision(Decision { target_id: target.clone(), action });
        let result = transition(&state, &test_context(), event);
        prop_assert_eq!(
            result.err(),
            Some(TransitionError::NoMatchingSuspension { target_id: target })
        );
    }

    // Approve and Edit execute exactly once; Reject executes nothing
    #[test]
    fn prop_decision_execution_counts(suspension in arb_suspension(), action in arb_action()) {
        let kind = action.kind();
        let state = TurnState::Suspended(suspension.clone());
        let event = Event::Decision(Decision { target_id: suspension.id.clone(), action });

        match transition(&state, &test_context(), event) {
            Ok(result) => {
                prop_assert!(suspension.allows(kind));
                let executes = result
                    .effects
                    .iter()
                    .filter(|e| matches!(e, Effect::ExecuteTool { .. }))
                    .count();
                let expected = usize::from(kind != DecisionKind::Reject);
                prop_assert_eq!(executes, expected);
                prop_assert!(result.new_state.suspension().is_none());
            }
            Err(e) => {
                prop_assert!(!suspension.allows(kind));
                prop_assert_eq!(e, TransitionError::DecisionNotAllowed { decision: kind });
            }
        }
    }

    // A suspended session refuses new user input
    #[test]
    fn prop_suspended_refuses_messages(suspension in arb_suspension(), text in "[a-z ]{1,20}") {
        let id = suspension.id.clone();
        let result = transition(&TurnState::Suspended(suspension), &test_context(), Event::UserMessage { text });
        prop_assert_eq!(result.err(), Some(TransitionError::SessionSuspended { suspension_id: id }));
    }
}
