//! Policy gate
//!
//! Decides whether a requested tool call may run now or must wait for a
//! human. Policies are pure: no I/O, no side effects.

use crate::db::Message;
use crate::state_machine::{DecisionKind, ToolInvocationRequest};
use std::collections::HashSet;

/// Everything a policy may look at
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub request: &'a ToolInvocationRequest,
    /// Registry classification of the requested tool
    pub side_effecting: bool,
    /// Session history before this request
    pub history: &'a [Message],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Proceed,
    Block(Vec<DecisionKind>),
}

pub trait Policy: Send + Sync {
    fn evaluate(&self, input: PolicyInput<'_>) -> GateVerdict;
}

/// Gates side-effecting tools on identity alone
#[derive(Debug, Clone, Default)]
pub struct SideEffectPolicy {
    /// Tools whose arguments may only be approved or rejected as-is
    non_editable: HashSet<String>,
}

impl SideEffectPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_non_editable(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.non_editable.extend(tools);
        self
    }
}

impl Policy for SideEffectPolicy {
    fn evaluate(&self, input: PolicyInput<'_>) -> GateVerdict {
        if !input.side_effecting {
            return GateVerdict::Proceed;
        }

        let allowed = if self.non_editable.contains(&input.request.name) {
            vec![DecisionKind::Approve, DecisionKind::Reject]
        } else {
            DecisionKind::ALL.to_vec()
        };
        GateVerdict::Block(allowed)
    }
}

type PolicyFn = dyn Fn(PolicyInput<'_>) -> GateVerdict + Send + Sync;

/// Policy backed by a caller-supplied function
pub struct FnPolicy(Box<PolicyFn>);

impl FnPolicy {
    pub fn new(f: impl Fn(PolicyInput<'_>) -> GateVerdict + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }
}

impl Policy for FnPolicy {
    fn evaluate(&self, input: PolicyInput<'_>) -> GateVerdict {
        (self.0)(input)
    }
}
