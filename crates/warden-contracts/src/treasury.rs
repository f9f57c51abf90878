//! The configured financial guardrails.
//!
//! A `TreasuryPolicy` is loaded whole at startup (TOML or defaults),
//! validated once, and treated as immutable for the engine's lifetime.
//! Rules that need it receive it at construction, not via a runtime lookup
//! per call.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{WardenError, WardenResult},
    spend::SpendCategory,
};

/// All configured financial caps, in cents unless noted.
///
/// Example TOML (any omitted field takes its default):
/// ```toml
/// max_single_transfer_cents = 5000
/// max_daily_transfer_cents = 25000
/// x402_allowed_domains = ["api.pay.example"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreasuryPolicy {
    /// Largest single transfer.
    pub max_single_transfer_cents: u64,
    /// Cap on transfers within the current wall-clock hour.
    pub max_hourly_transfer_cents: u64,
    /// Cap on transfers within the current wall-clock day.
    pub max_daily_transfer_cents: u64,
    /// Balance floor a transfer may never dip below.
    pub minimum_reserve_cents: u64,
    /// Largest single x402 payment.
    pub max_x402_payment_cents: u64,
    /// Domains x402 payments may be made to. Empty means none — payments
    /// are refused until a domain is deliberately allowed.
    pub x402_allowed_domains: Vec<String>,
    /// Minimum gap between transfers, in milliseconds. Zero disables the
    /// cooldown.
    pub transfer_cooldown_ms: u64,
    /// How many transfer-class calls a single turn may make.
    pub max_transfers_per_turn: u32,
    /// Cap on inference spend within the current wall-clock day.
    pub max_inference_daily_cents: u64,
    /// Transfers above this amount are quarantined for confirmation even
    /// when every cap is satisfied.
    pub require_confirmation_above_cents: u64,
}

impl Default for TreasuryPolicy {
    fn default() -> Self {
        Self {
            max_single_transfer_cents: 5_000,
            max_hourly_transfer_cents: 10_000,
            max_daily_transfer_cents: 25_000,
            minimum_reserve_cents: 1_000,
            max_x402_payment_cents: 100,
            x402_allowed_domains: Vec::new(),
            transfer_cooldown_ms: 0,
            max_transfers_per_turn: 2,
            max_inference_daily_cents: 50_000,
            require_confirmation_above_cents: 1_000,
        }
    }
}

impl TreasuryPolicy {
    /// Parse `s` as a TOML treasury policy.
    ///
    /// Returns `WardenError::Config` if the TOML is malformed or the
    /// resulting policy fails `validate()`.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        let policy: TreasuryPolicy = toml::from_str(s).map_err(|e| WardenError::Config {
            reason: format!("failed to parse treasury policy TOML: {}", e),
        })?;
        policy.validate()?;
        Ok(policy)
    }

    /// Read the file at `path` and parse it as a TOML treasury policy.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::Config {
            reason: format!("failed to read treasury policy '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check the policy for internal consistency.
    ///
    /// A malformed policy must fail here, at construction time, before any
    /// request is evaluated.
    pub fn validate(&self) -> WardenResult<()> {
        if self.max_single_transfer_cents == 0 {
            return Err(WardenError::Config {
                reason: "max_single_transfer_cents must be nonzero".to_string(),
            });
        }
        if self.max_single_transfer_cents > self.max_hourly_transfer_cents {
            return Err(WardenError::Config {
                reason: format!(
                    "max_single_transfer_cents ({}) exceeds max_hourly_transfer_cents ({})",
                    self.max_single_transfer_cents, self.max_hourly_transfer_cents
                ),
            });
        }
        if self.max_hourly_transfer_cents > self.max_daily_transfer_cents {
            return Err(WardenError::Config {
                reason: format!(
                    "max_hourly_transfer_cents ({}) exceeds max_daily_transfer_cents ({})",
                    self.max_hourly_transfer_cents, self.max_daily_transfer_cents
                ),
            });
        }
        for domain in &self.x402_allowed_domains {
            if domain.is_empty() || domain.contains('/') || domain.contains("://") {
                return Err(WardenError::Config {
                    reason: format!(
                        "x402_allowed_domains entry '{}' must be a bare host name",
                        domain
                    ),
                });
            }
        }
        Ok(())
    }

    /// The (hourly, daily) caps that apply to a spend category.
    ///
    /// `None` means that window is uncapped for the category.
    pub fn caps_for(&self, category: SpendCategory) -> (Option<u64>, Option<u64>) {
        match category {
            SpendCategory::Transfer | SpendCategory::X402 => (
                Some(self.max_hourly_transfer_cents),
                Some(self.max_daily_transfer_cents),
            ),
            SpendCategory::Inference => (None, Some(self.max_inference_daily_cents)),
            SpendCategory::Other => (None, None),
        }
    }
}
