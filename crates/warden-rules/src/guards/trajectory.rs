//! Trajectory hash guard: loop / hallucination-retry detection.
//!
//! An injected or confused agent can get stuck retrying a semantically
//! identical financial action expecting a different outcome. Per-call
//! amount limits do not catch this — each individual call may be within
//! bounds. This guard hashes (tool, target, amount) canonically, so
//! argument-ordering or formatting differences do not evade detection, and
//! blocks once the same digest repeats too often inside the window.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::warn;

use warden_contracts::{
    error::{WardenError, WardenResult},
    policy::RuleVerdict,
    request::PolicyRequest,
    tool::ToolSelector,
};
use warden_core::traits::PolicyRule;

use super::{FINANCIAL_TOOLS, GUARD_PRIORITY};

/// How far back repeated calls are remembered, in seconds.
const WINDOW_SECS: i64 = 60;

/// Duplicates already in the window at which the next call is denied.
const MAX_DUPLICATES: usize = 3;

/// The argument keys that can carry a call's target, in precedence order.
const TARGET_KEYS: [&str; 4] = ["to_address", "agent_address", "url", "to"];

/// The argument keys that can carry a call's amount, in precedence order.
const AMOUNT_KEYS: [&str; 3] = ["amount_cents", "amount", "value"];

struct WindowEntry {
    digest: String,
    at: DateTime<Utc>,
}

/// Canonical digest of (tool, target, amount).
///
/// The target is the first present of the target keys, the amount the
/// first present of the amount keys (default `"0"`). Returns the first 16
/// hex chars of the SHA-256 — plenty for loop detection, cheap to compare.
fn trajectory_digest(tool_name: &str, args: &serde_json::Value) -> String {
    let target = TARGET_KEYS
        .iter()
        .find_map(|k| args.get(k).and_then(serde_json::Value::as_str))
        .unwrap_or("");

    let amount = AMOUNT_KEYS
        .iter()
        .find_map(|k| args.get(k))
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "0".to_string());

    let canonical = format!("{}:{}:{}", tool_name, target, amount);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(16);
    digest
}

/// Detects hallucination retry loops on financial tools.
pub struct TrajectoryHashRule {
    selector: ToolSelector,
    window: Mutex<VecDeque<WindowEntry>>,
}

impl TrajectoryHashRule {
    pub fn new() -> Self {
        Self {
            selector: ToolSelector::names(FINANCIAL_TOOLS),
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Clear the window. For tests; production state lives for the
    /// process.
    pub fn reset(&self) {
        if let Ok(mut window) = self.window.lock() {
            window.clear();
        }
    }

    fn check_at(
        &self,
        request: &PolicyRequest,
        now: DateTime<Utc>,
    ) -> WardenResult<Option<RuleVerdict>> {
        let digest = trajectory_digest(&request.tool.name, &request.args);

        let mut window = self.window.lock().map_err(|_| WardenError::RuleFault {
            rule: self.id().to_string(),
            reason: "trajectory window lock poisoned".to_string(),
        })?;

        while window
            .front()
            .is_some_and(|e| now - e.at > Duration::seconds(WINDOW_SECS))
        {
            window.pop_front();
        }

        let duplicates = window.iter().filter(|e| e.digest == digest).count();

        // Record the attempt regardless of verdict, so the window reflects
        // attempted calls, not just successful ones.
        window.push_back(WindowEntry { digest, at: now });

        if duplicates >= MAX_DUPLICATES {
            warn!(
                tool = %request.tool.name,
                duplicates = duplicates + 1,
                "trajectory loop detected"
            );
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "LOOP_DETECTED",
                format!(
                    "Blocked: {} identical {} calls in {}s. This looks like a retry loop; \
                     change strategy instead of retrying.",
                    duplicates + 1,
                    request.tool.name,
                    WINDOW_SECS
                ),
            )));
        }

        if duplicates == MAX_DUPLICATES - 1 {
            return Ok(Some(RuleVerdict::quarantine(
                self.id(),
                "LOOP_WARNING",
                format!(
                    "Warning: {} identical {} calls detected. One more identical call will \
                     be hard-blocked.",
                    duplicates + 1,
                    request.tool.name
                ),
            )));
        }

        Ok(None)
    }
}

impl Default for TrajectoryHashRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRule for TrajectoryHashRule {
    fn id(&self) -> &str {
        "guard.trajectory_hash"
    }

    fn description(&self) -> &str {
        "Detect hallucination retry loops via trajectory hashing"
    }

    fn priority(&self) -> u32 {
        GUARD_PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        self.check_at(request, Utc::now())
    }
}
