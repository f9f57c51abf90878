//! Spend-tracking value types.
//!
//! A `SpendEntry` is one financial action to be tallied; a
//! `LimitCheckResult` is the outcome of checking a proposed amount against
//! the configured windowed caps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category a spend is tallied under. Each category has its own
/// hourly/daily windows and caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendCategory {
    /// Direct credit transfers to another address (includes child funding).
    Transfer,
    /// Machine-payable HTTP (x402) payments.
    X402,
    /// Model inference costs.
    Inference,
    /// Anything else.
    Other,
}

impl fmt::Display for SpendCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpendCategory::Transfer => "transfer",
            SpendCategory::X402 => "x402",
            SpendCategory::Inference => "inference",
            SpendCategory::Other => "other",
        };
        f.write_str(s)
    }
}

/// One financial action, recorded at the moment of the tool call and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendEntry {
    /// The tool that spent the money.
    pub tool_name: String,
    /// Amount in cents.
    pub amount_cents: u64,
    /// Receiving address, when the spend has one.
    pub recipient: Option<String>,
    /// Paid domain, for x402 payments.
    pub domain: Option<String>,
    /// Category the amount is tallied under.
    pub category: SpendCategory,
}

/// Outcome of a spend-limit check.
///
/// Both current figures are returned in every case so the caller can
/// present a precise reason. A limit of `None` means the corresponding
/// window is uncapped for the checked category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitCheckResult {
    /// Whether the proposed amount fits inside both windows.
    pub allowed: bool,
    /// Populated when `allowed` is false: which window would overflow.
    pub reason: Option<String>,
    /// Spend already recorded in the current wall-clock hour.
    pub current_hourly_spend: u64,
    /// Spend already recorded in the current wall-clock day.
    pub current_daily_spend: u64,
    /// The hourly cap applied, if the category has one.
    pub limit_hourly: Option<u64>,
    /// The daily cap applied, if the category has one.
    pub limit_daily: Option<u64>,
}
