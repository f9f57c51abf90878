//! The persisted decision row.
//!
//! One row per evaluated request, written through the `DecisionStore`
//! collaborator. The core does not prescribe a storage engine — only this
//! shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{policy::PolicyAction, tool::RiskLevel};

/// One audit row for a policy decision.
///
/// Carries both the evaluated and the triggered rule-id lists so an auditor
/// can see near-misses, and the arguments hash instead of the raw
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRow {
    /// Unique row id.
    pub id: String,
    /// The turn the call belonged to, when known.
    pub turn_id: Option<String>,
    /// The tool the request targeted.
    pub tool_name: String,
    /// Lowercase hex SHA-256 of the canonical JSON arguments.
    pub args_hash: String,
    /// The tool's static risk classification.
    pub risk_level: RiskLevel,
    /// The composed action.
    pub decision: PolicyAction,
    /// Ids of every rule invoked, in evaluation order.
    pub rules_evaluated: Vec<String>,
    /// Ids of rules that returned a verdict.
    pub rules_triggered: Vec<String>,
    /// `"CODE: human message"` for the winning verdict.
    pub reason: String,
    /// Wall time the evaluation took.
    pub latency_ms: u64,
    /// When the decision was finalized.
    pub created_at: DateTime<Utc>,
}
