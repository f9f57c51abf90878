//! Anomaly guards: the transaction-defense engines.
//!
//! Three independent detectors, each one policy rule with its own
//! sliding-window memory, covering attack classes that static per-call
//! limits cannot catch:
//!
//!   1. Trajectory hash — detects hallucination retry loops by hashing
//!      (tool, target, amount) and blocking repeated identical calls
//!      within a sliding window.
//!   2. Capital velocity — enforces a maximum spend rate over a sliding
//!      window, catching both rapid drains and slow bleeds that stay
//!      under per-transaction limits.
//!   3. Entropy guard — blocks payloads containing private keys, seed
//!      phrases, or high-entropy blobs, the signature of an exfiltration
//!      attempt.
//!
//! Window sizes and thresholds are fixed security constants of the guard
//! modules, deliberately not part of `TreasuryPolicy`.

pub mod entropy;
pub mod trajectory;
pub mod velocity;

pub use entropy::EntropyGuardRule;
pub use trajectory::TrajectoryHashRule;
pub use velocity::CapitalVelocityRule;

use warden_core::traits::PolicyRule;

/// Evaluation order: after validation and rate limits, before the
/// per-transaction financial caps.
pub(crate) const GUARD_PRIORITY: u32 = 450;

/// The tools that move money.
pub(crate) const FINANCIAL_TOOLS: [&str; 3] = ["transfer_credits", "x402_fetch", "fund_child"];

/// Create all three anomaly-guard rules with fresh window state.
pub fn create_guard_rules() -> Vec<Box<dyn PolicyRule>> {
    vec![
        Box::new(TrajectoryHashRule::new()),
        Box::new(CapitalVelocityRule::new()),
        Box::new(EntropyGuardRule::new()),
    ]
}
