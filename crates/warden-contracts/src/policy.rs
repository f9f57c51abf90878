//! Policy verdict and decision types.
//!
//! A rule that matches produces a `RuleVerdict`; the engine composes all
//! verdicts for one request into a single `PolicyDecision`. The composition
//! law is strict: the first `deny` is final, and a `quarantine` can only be
//! escalated to `deny` by a later rule, never dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::RiskLevel;

/// The overall action a decision (or a single rule) calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    /// The call may proceed.
    Allow,
    /// The call is refused outright.
    Deny,
    /// Soft block: the call is flagged/warned pending escalation policy.
    Quarantine,
}

/// Trust tier derived from who originated the current turn.
///
/// See `derive_authority_level` in warden-core for the total mapping from
/// `InputSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityLevel {
    /// The runtime itself (scheduled wakeups, system maintenance).
    System,
    /// The agent's own reasoning, or its creator speaking directly.
    Agent,
    /// Anything else — inbound messages, heartbeat-triggered tasks, or an
    /// unknown origin. The least-trusted tier; unknown sources land here.
    External,
}

/// Who or what triggered the turn a tool call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    /// A scheduled heartbeat task fired.
    Heartbeat,
    /// The agent's creator sent a message.
    Creator,
    /// The agent's own reasoning loop continued.
    Agent,
    /// The runtime injected a system event.
    System,
    /// The agent was woken from sleep.
    Wakeup,
}

/// One rule's verdict on a request.
///
/// Rules never return an explicit `allow` — silence (a `None` result) is
/// how a rule approves. A constructed verdict is always `Deny` or
/// `Quarantine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVerdict {
    /// Id of the rule that produced this verdict.
    pub rule: String,
    /// The action the rule calls for.
    pub action: PolicyAction,
    /// Stable machine-readable reason code, e.g. `"LOOP_DETECTED"`.
    pub reason_code: String,
    /// Human-readable explanation. Distinct from the reason code: the agent
    /// (and any auditor) needs to understand *why* in order to change
    /// behavior, not just that it was blocked.
    pub message: String,
}

impl RuleVerdict {
    /// Construct a deny verdict.
    pub fn deny(
        rule: impl Into<String>,
        reason_code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            action: PolicyAction::Deny,
            reason_code: reason_code.into(),
            message: message.into(),
        }
    }

    /// Construct a quarantine verdict.
    pub fn quarantine(
        rule: impl Into<String>,
        reason_code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            action: PolicyAction::Quarantine,
            reason_code: reason_code.into(),
            message: message.into(),
        }
    }
}

/// The engine's composed, final verdict for one request.
///
/// Produced once per `PolicyRequest`, immutable after creation, and
/// persisted as an audit row. Carries the SHA-256 hash of the canonicalized
/// arguments rather than the arguments themselves, so two identical calls
/// are auditable as identical without storing raw values (which may contain
/// secrets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// The composed action.
    pub action: PolicyAction,
    /// Machine-readable reason code (`"ALLOWED"` when no rule objected).
    pub reason_code: String,
    /// Human-readable explanation of the winning verdict.
    pub message: String,
    /// The tool's static risk classification.
    pub risk_level: RiskLevel,
    /// Trust tier of the originating turn.
    pub authority_level: AuthorityLevel,
    /// Name of the tool the request targeted.
    pub tool_name: String,
    /// Lowercase hex SHA-256 of the canonical JSON arguments.
    pub args_hash: String,
    /// Ids of every rule whose selector matched and which was invoked,
    /// in evaluation order.
    pub rules_evaluated: Vec<String>,
    /// Ids of rules that returned a verdict. Always a subset of
    /// `rules_evaluated`; keeping both lets an auditor see near-misses.
    pub rules_triggered: Vec<String>,
    /// Wall time the evaluation took.
    pub latency_ms: u64,
    /// Taken at the moment the decision was finalized, not at request
    /// construction.
    pub timestamp: DateTime<Utc>,
}
