//! Financial policy rules.
//!
//! Enforces the treasury guardrails: per-transfer caps, windowed spend
//! limits, the balance reserve, per-turn transfer counts, the transfer
//! cooldown, and the x402 payment policy. Each rule captures what it needs
//! (the treasury policy, the spend tracker, the decision store) at
//! construction.

use std::sync::Arc;

use chrono::{Duration, Utc};

use warden_contracts::{
    error::WardenResult,
    policy::RuleVerdict,
    request::PolicyRequest,
    spend::SpendCategory,
    tool::ToolSelector,
    treasury::TreasuryPolicy,
};
use warden_core::traits::{DecisionStore, PolicyRule, SpendTracker};

const PRIORITY: u32 = 500;

/// Tools whose amounts count as direct transfers.
const TRANSFER_TOOLS: [&str; 2] = ["transfer_credits", "fund_child"];

/// Render cents as dollars for operator-legible messages.
fn dollars(cents: u64) -> String {
    format!("${:.2}", cents as f64 / 100.0)
}

/// Lowercased host portion of a URL, without scheme, userinfo, port, or
/// path.
fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = authority.split(':').next()?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// True when `host` is `domain` itself or a subdomain of it.
fn domain_allowed(host: &str, allowlist: &[String]) -> bool {
    allowlist.iter().any(|domain| {
        let domain = domain.to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    })
}

// ── Per-transfer cap ──────────────────────────────────────────────────────────

/// Caps a single transfer, and quarantines amounts above the confirmation
/// threshold even when they fit under the cap.
struct SingleTransferCapRule {
    selector: ToolSelector,
    policy: TreasuryPolicy,
}

impl PolicyRule for SingleTransferCapRule {
    fn id(&self) -> &str {
        "financial.single_transfer_cap"
    }

    fn description(&self) -> &str {
        "Single transfers are capped; large ones require confirmation"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let Some(amount) = request.u64_arg("amount_cents") else {
            return Ok(None);
        };

        if amount > self.policy.max_single_transfer_cents {
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "TRANSFER_CAP_EXCEEDED",
                format!(
                    "Transfer of {} exceeds the single-transfer cap of {}.",
                    dollars(amount),
                    dollars(self.policy.max_single_transfer_cents)
                ),
            )));
        }

        if amount > self.policy.require_confirmation_above_cents {
            return Ok(Some(RuleVerdict::quarantine(
                self.id(),
                "CONFIRMATION_REQUIRED",
                format!(
                    "Transfer of {} is above the {} confirmation threshold.",
                    dollars(amount),
                    dollars(self.policy.require_confirmation_above_cents)
                ),
            )));
        }

        Ok(None)
    }
}

// ── Windowed spend limits ─────────────────────────────────────────────────────

/// Checks the proposed amount against the hourly and daily transfer
/// windows.
struct SpendLimitsRule {
    selector: ToolSelector,
    policy: TreasuryPolicy,
    tracker: Arc<dyn SpendTracker>,
}

impl PolicyRule for SpendLimitsRule {
    fn id(&self) -> &str {
        "financial.spend_limits"
    }

    fn description(&self) -> &str {
        "Transfers must fit inside the hourly and daily spend windows"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let Some(amount) = request.u64_arg("amount_cents") else {
            return Ok(None);
        };

        let check = self
            .tracker
            .check_limit(amount, SpendCategory::Transfer, &self.policy);

        if !check.allowed {
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "SPEND_LIMIT_EXCEEDED",
                format!(
                    "{} ({} spent this hour, {} today).",
                    check.reason.unwrap_or_else(|| "windowed spend cap exceeded".to_string()),
                    dollars(check.current_hourly_spend),
                    dollars(check.current_daily_spend)
                ),
            )));
        }

        Ok(None)
    }
}

// ── Minimum reserve ───────────────────────────────────────────────────────────

/// Keeps the balance above the configured floor. No opinion when the
/// caller supplied no balance snapshot.
struct MinimumReserveRule {
    selector: ToolSelector,
    policy: TreasuryPolicy,
}

impl PolicyRule for MinimumReserveRule {
    fn id(&self) -> &str {
        "financial.minimum_reserve"
    }

    fn description(&self) -> &str {
        "Spending may not dip the balance below the reserve"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let Some(amount) = request.u64_arg("amount_cents") else {
            return Ok(None);
        };
        let Some(balance) = request.turn.credits_balance_cents else {
            return Ok(None);
        };

        if balance < amount + self.policy.minimum_reserve_cents {
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "RESERVE_BREACH",
                format!(
                    "Spending {} would leave less than the {} reserve (balance {}).",
                    dollars(amount),
                    dollars(self.policy.minimum_reserve_cents),
                    dollars(balance)
                ),
            )));
        }

        Ok(None)
    }
}

// ── Per-turn transfer count ───────────────────────────────────────────────────

/// Caps how many transfer-class calls one turn may make.
struct TransfersPerTurnRule {
    selector: ToolSelector,
    policy: TreasuryPolicy,
}

impl PolicyRule for TransfersPerTurnRule {
    fn id(&self) -> &str {
        "financial.transfers_per_turn"
    }

    fn description(&self) -> &str {
        "A single turn may only make a bounded number of transfers"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        if request.turn.transfers_this_turn >= self.policy.max_transfers_per_turn {
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "TURN_TRANSFER_LIMIT",
                format!(
                    "This turn already made {} transfers; the per-turn limit is {}.",
                    request.turn.transfers_this_turn, self.policy.max_transfers_per_turn
                ),
            )));
        }

        Ok(None)
    }
}

// ── Transfer cooldown ─────────────────────────────────────────────────────────

/// Enforces a minimum gap between transfers, measured against the decision
/// log. Disabled when the configured cooldown is zero.
struct TransferCooldownRule {
    selector: ToolSelector,
    policy: TreasuryPolicy,
    store: Arc<dyn DecisionStore>,
}

impl PolicyRule for TransferCooldownRule {
    fn id(&self) -> &str {
        "financial.transfer_cooldown"
    }

    fn description(&self) -> &str {
        "Transfers are separated by a minimum cooldown"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, _request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        if self.policy.transfer_cooldown_ms == 0 {
            return Ok(None);
        }

        let Some(last) = self.store.last_allowed_at(&TRANSFER_TOOLS)? else {
            return Ok(None);
        };

        let cooldown = Duration::milliseconds(self.policy.transfer_cooldown_ms as i64);
        let elapsed = Utc::now() - last;
        if elapsed < cooldown {
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "TRANSFER_COOLDOWN",
                format!(
                    "Last transfer was {}ms ago; the cooldown is {}ms.",
                    elapsed.num_milliseconds(),
                    self.policy.transfer_cooldown_ms
                ),
            )));
        }

        Ok(None)
    }
}

// ── x402 payment policy ───────────────────────────────────────────────────────

/// Applies the x402 guardrails: per-payment cap, domain allowlist, and the
/// windowed x402 spend check.
struct X402PolicyRule {
    selector: ToolSelector,
    policy: TreasuryPolicy,
    tracker: Arc<dyn SpendTracker>,
}

impl PolicyRule for X402PolicyRule {
    fn id(&self) -> &str {
        "financial.x402_policy"
    }

    fn description(&self) -> &str {
        "x402 payments are capped and restricted to allowlisted domains"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let amount = request.u64_arg("amount_cents").unwrap_or(0);

        if amount > self.policy.max_x402_payment_cents {
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "X402_CAP_EXCEEDED",
                format!(
                    "x402 payment of {} exceeds the per-payment cap of {}.",
                    dollars(amount),
                    dollars(self.policy.max_x402_payment_cents)
                ),
            )));
        }

        // Paying at all requires an allowlisted destination. A fetch with
        // no payment attached is not this rule's concern.
        if amount > 0 {
            let host = request.str_arg("url").and_then(host_of);
            let allowed = host
                .as_deref()
                .is_some_and(|h| domain_allowed(h, &self.policy.x402_allowed_domains));

            if !allowed {
                return Ok(Some(RuleVerdict::deny(
                    self.id(),
                    "X402_DOMAIN_BLOCKED",
                    format!(
                        "x402 payment to '{}' refused: not on the domain allowlist.",
                        host.unwrap_or_else(|| "<no url>".to_string())
                    ),
                )));
            }

            let check = self.tracker.check_limit(amount, SpendCategory::X402, &self.policy);
            if !check.allowed {
                return Ok(Some(RuleVerdict::deny(
                    self.id(),
                    "SPEND_LIMIT_EXCEEDED",
                    format!(
                        "{} ({} spent this hour, {} today).",
                        check.reason.unwrap_or_else(|| "windowed spend cap exceeded".to_string()),
                        dollars(check.current_hourly_spend),
                        dollars(check.current_daily_spend)
                    ),
                )));
            }
        }

        Ok(None)
    }
}

/// Create all financial rules.
pub fn create_financial_rules(
    policy: TreasuryPolicy,
    tracker: Arc<dyn SpendTracker>,
    store: Arc<dyn DecisionStore>,
) -> Vec<Box<dyn PolicyRule>> {
    let transfers = ToolSelector::names(TRANSFER_TOOLS);

    vec![
        Box::new(SingleTransferCapRule {
            selector: transfers.clone(),
            policy: policy.clone(),
        }),
        Box::new(SpendLimitsRule {
            selector: transfers.clone(),
            policy: policy.clone(),
            tracker: tracker.clone(),
        }),
        Box::new(MinimumReserveRule {
            selector: ToolSelector::names(["transfer_credits", "fund_child", "x402_fetch"]),
            policy: policy.clone(),
        }),
        Box::new(TransfersPerTurnRule {
            selector: transfers.clone(),
            policy: policy.clone(),
        }),
        Box::new(TransferCooldownRule {
            selector: transfers,
            policy: policy.clone(),
            store,
        }),
        Box::new(X402PolicyRule {
            selector: ToolSelector::names(["x402_fetch"]),
            policy,
            tracker,
        }),
    ]
}
