//! Capital velocity guard: spend-rate limiting.
//!
//! Catches "slow bleed" attacks that stay under every per-transaction cap
//! but drain funds through many small transfers in quick succession — a
//! pattern per-call and even hourly caps miss when the attacker paces
//! calls just under each threshold. The guard sums a sliding window of
//! recent spends and refuses anything that would push the window past a
//! fixed cap.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use warden_contracts::{
    error::{WardenError, WardenResult},
    policy::RuleVerdict,
    request::PolicyRequest,
    tool::ToolSelector,
};
use warden_core::traits::PolicyRule;

use super::{FINANCIAL_TOOLS, GUARD_PRIORITY};

/// The sliding window, in seconds.
const WINDOW_SECS: i64 = 300;

/// Maximum spend inside one window, in cents ($500 per 5 minutes).
const MAX_CENTS_PER_WINDOW: u64 = 50_000;

/// Window utilization (percent) at which the guard starts warning.
const WARN_UTILIZATION_PCT: u64 = 80;

struct WindowEntry {
    amount_cents: u64,
    at: DateTime<Utc>,
}

/// Render cents as dollars for operator-legible messages.
fn dollars(cents: u64) -> String {
    format!("${:.2}", cents as f64 / 100.0)
}

/// Enforces a maximum capital velocity across all financial tools.
pub struct CapitalVelocityRule {
    selector: ToolSelector,
    window: Mutex<VecDeque<WindowEntry>>,
}

impl CapitalVelocityRule {
    pub fn new() -> Self {
        Self {
            selector: ToolSelector::names(FINANCIAL_TOOLS),
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Clear the window. For tests.
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
        let Some(amount) = request.u64_arg("amount_cents").filter(|a| *a > 0) else {
            return Ok(None);
        };

        let mut window = self.window.lock().map_err(|_| WardenError::RuleFault {
            rule: self.id().to_string(),
            reason: "velocity window lock poisoned".to_string(),
        })?;

        while window
            .front()
            .is_some_and(|e| now - e.at > Duration::seconds(WINDOW_SECS))
        {
            window.pop_front();
        }

        let window_spend: u64 = window.iter().map(|e| e.amount_cents).sum();

        if window_spend + amount > MAX_CENTS_PER_WINDOW {
            warn!(
                window_spend_cents = window_spend,
                amount_cents = amount,
                "capital velocity breach"
            );
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "VELOCITY_BREACH",
                format!(
                    "Blocked: spend velocity exceeded. {} spent in the last {}s; adding {} \
                     would exceed the {} velocity cap. Wait for the window to cool down.",
                    dollars(window_spend),
                    WINDOW_SECS,
                    dollars(amount),
                    dollars(MAX_CENTS_PER_WINDOW)
                ),
            )));
        }

        // The spend counts toward future checks even though this check is
        // read-only with respect to actual settlement.
        window.push_back(WindowEntry { amount_cents: amount, at: now });

        let utilization_pct = (window_spend + amount) * 100 / MAX_CENTS_PER_WINDOW;
        if utilization_pct >= WARN_UTILIZATION_PCT {
            return Ok(Some(RuleVerdict::quarantine(
                self.id(),
                "VELOCITY_WARNING",
                format!(
                    "Velocity at {}% of cap ({} / {} in {}s). Slow down to avoid a hard \
                     block.",
                    utilization_pct,
                    dollars(window_spend + amount),
                    dollars(MAX_CENTS_PER_WINDOW),
                    WINDOW_SECS
                ),
            )));
        }

        Ok(None)
    }
}

impl Default for CapitalVelocityRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRule for CapitalVelocityRule {
    fn id(&self) -> &str {
        "guard.capital_velocity"
    }

    fn description(&self) -> &str {
        "Enforce maximum capital velocity (spend rate) across financial tools"
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
