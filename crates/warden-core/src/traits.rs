//! Core trait definitions for the WARDEN policy pipeline.
//!
//! Three traits define the trust boundary:
//!
//! - `PolicyRule`    — one independently testable policy concern
//! - `SpendTracker`  — windowed financial accounting
//! - `DecisionStore` — the persisted decision log
//!
//! The engine wires them together. Tool implementations are never consulted
//! here — the engine decides whether a proposed action may proceed, not
//! what the agent should do.

use chrono::{DateTime, Utc};

use warden_contracts::{
    error::WardenResult,
    log::DecisionRow,
    policy::RuleVerdict,
    request::PolicyRequest,
    spend::{LimitCheckResult, SpendCategory, SpendEntry},
    tool::ToolSelector,
    treasury::TreasuryPolicy,
};

/// One policy concern, evaluated against requests its selector matches.
///
/// Implementations are constructed once at startup and immutable
/// afterwards. They are pure functions of the request, with two sanctioned
/// exceptions: the anomaly guards own private sliding-window state, and
/// rate-limit rules read the decision log. Neither may perform unbounded
/// I/O — a rule that blocks stalls the entire tool pipeline.
pub trait PolicyRule: Send + Sync {
    /// Stable rule id used in audit rows and messages.
    fn id(&self) -> &str;

    /// Human-readable explanation of what this rule controls.
    fn description(&self) -> &str;

    /// Evaluation order: lower numbers run first. Fixed at construction so
    /// rule order is a static, auditable property of the configuration.
    fn priority(&self) -> u32;

    /// Which tools this rule inspects. A rule is never evaluated against a
    /// tool outside its selector.
    fn applies_to(&self) -> &ToolSelector;

    /// Evaluate the request.
    ///
    /// `Ok(None)` means the rule has no opinion and the walk continues.
    /// `Ok(Some(verdict))` contributes a deny or quarantine. `Err` is a
    /// rule-evaluation fault: the engine records it and treats the rule as
    /// having no opinion rather than aborting the pipeline.
    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>>;
}

/// Windowed financial accounting over an append-only record of spends.
///
/// Spend is tallied per category against two independent windows: the
/// current wall-clock hour and the current wall-clock day. Calendar-aligned
/// windows (not rolling lookbacks) keep the accounting auditable and match
/// how the caps in `TreasuryPolicy` are expressed.
pub trait SpendTracker: Send + Sync {
    /// Append one spend record.
    fn record_spend(&self, entry: SpendEntry);

    /// Total recorded in `category` during the current wall-clock hour.
    fn get_hourly_spend(&self, category: SpendCategory) -> u64;

    /// Total recorded in `category` during the current wall-clock day.
    fn get_daily_spend(&self, category: SpendCategory) -> u64;

    /// Total recorded in `category` since `since`.
    fn get_total_spend(&self, category: SpendCategory, since: DateTime<Utc>) -> u64;

    /// Would spending `amount_cents` more in `category` fit inside both
    /// windows? Rejects if *either* window plus the amount would exceed its
    /// cap; always returns both current figures.
    fn check_limit(
        &self,
        amount_cents: u64,
        category: SpendCategory,
        policy: &TreasuryPolicy,
    ) -> LimitCheckResult;

    /// Delete records older than `retention_days` and return how many were
    /// removed. Pruning is an explicit maintenance operation, never a side
    /// effect of a read — historical queries stay exact until a retention
    /// policy is deliberately applied.
    fn prune_old_records(&self, retention_days: u32) -> usize;
}

/// The persisted decision log.
///
/// The engine writes one row per evaluated request; rate-limit rules read
/// counts back. Implementations must treat inserts as append-only.
pub trait DecisionStore: Send + Sync {
    /// Append one decision row.
    fn insert(&self, row: &DecisionRow) -> WardenResult<()>;

    /// Count allowed decisions for `tool_name` created at or after `since`.
    fn count_allowed_since(&self, tool_name: &str, since: DateTime<Utc>) -> WardenResult<u64>;

    /// Timestamp of the most recent allowed decision for any of
    /// `tool_names`, if one exists.
    fn last_allowed_at(&self, tool_names: &[&str]) -> WardenResult<Option<DateTime<Utc>>>;
}
