//! # warden-rules
//!
//! The policy rule registry for the WARDEN engine.
//!
//! ## Overview
//!
//! Six rule families plus three anomaly guards, each a pure-construction
//! function returning `Box<dyn PolicyRule>` values, aggregated by
//! [`default_rules`] into one ordered set. Evaluation order (ascending
//! priority):
//!
//! | priority | family |
//! |---|---|
//! | 50  | authority |
//! | 100 | path protection |
//! | 150 | command safety |
//! | 200 | validation |
//! | 300 | rate limits |
//! | 450 | anomaly guards |
//! | 500 | financial |
//!
//! Each rule captures its collaborators (treasury policy, spend tracker,
//! decision store) at construction; requests stay plain data.

pub mod authority;
pub mod command_safety;
pub mod financial;
pub mod guards;
pub mod path_protection;
pub mod rate_limits;
pub mod validation;

use std::sync::Arc;

use warden_contracts::{error::WardenResult, treasury::TreasuryPolicy};
use warden_core::traits::{DecisionStore, PolicyRule, SpendTracker};

/// Create the default rule set.
///
/// Validates the treasury policy first — a malformed configuration fails
/// here, before any request can be evaluated.
pub fn default_rules(
    treasury: &TreasuryPolicy,
    spend: Arc<dyn SpendTracker>,
    store: Arc<dyn DecisionStore>,
) -> WardenResult<Vec<Box<dyn PolicyRule>>> {
    treasury.validate()?;

    let mut rules = Vec::new();
    rules.extend(authority::create_authority_rules());
    rules.extend(path_protection::create_path_protection_rules());
    rules.extend(command_safety::create_command_safety_rules());
    rules.extend(validation::create_validation_rules());
    rules.extend(rate_limits::create_rate_limit_rules(store.clone()));
    rules.extend(guards::create_guard_rules());
    rules.extend(financial::create_financial_rules(treasury.clone(), spend, store));

    Ok(rules)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
