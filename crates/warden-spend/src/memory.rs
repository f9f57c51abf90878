//! In-memory implementation of `SpendTracker`.
//!
//! `MemorySpendLedger` is the reference implementation of the
//! `SpendTracker` trait. It keeps all records in a `Vec` protected by a
//! `Mutex`, so financial rules on concurrent evaluations observe a
//! consistent tally.
//!
//! The public trait methods read the clock themselves; every
//! time-dependent computation lives in an `_at` variant taking an explicit
//! timestamp, so window behavior is testable without waiting for wall-clock
//! boundaries.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use warden_contracts::{
    spend::{LimitCheckResult, SpendCategory, SpendEntry},
    treasury::TreasuryPolicy,
};
use warden_core::traits::SpendTracker;

use crate::window::{day_label, hour_label};

/// One recorded spend, stamped with the window labels it was tallied under.
#[derive(Debug, Clone)]
struct SpendRecord {
    entry: SpendEntry,
    recorded_at: DateTime<Utc>,
    window_hour: String,
    window_day: String,
}

/// An append-only, in-memory spend ledger with calendar-window aggregation.
///
/// # Thread safety
///
/// All operations acquire a `Mutex` internally; the ledger can be shared
/// across threads behind an `Arc`.
#[derive(Default)]
pub struct MemorySpendLedger {
    records: Mutex<Vec<SpendRecord>>,
}

impl MemorySpendLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_at(&self, entry: SpendEntry, now: DateTime<Utc>) {
        debug!(
            tool = %entry.tool_name,
            amount_cents = entry.amount_cents,
            category = %entry.category,
            "recording spend"
        );

        let record = SpendRecord {
            window_hour: hour_label(now),
            window_day: day_label(now),
            recorded_at: now,
            entry,
        };
        self.records
            .lock()
            .expect("spend ledger lock poisoned")
            .push(record);
    }

    pub(crate) fn hourly_spend_at(&self, category: SpendCategory, now: DateTime<Utc>) -> u64 {
        let label = hour_label(now);
        self.records
            .lock()
            .expect("spend ledger lock poisoned")
            .iter()
            .filter(|r| r.entry.category == category && r.window_hour == label)
            .map(|r| r.entry.amount_cents)
            .sum()
    }

    pub(crate) fn daily_spend_at(&self, category: SpendCategory, now: DateTime<Utc>) -> u64 {
        let label = day_label(now);
        self.records
            .lock()
            .expect("spend ledger lock poisoned")
            .iter()
            .filter(|r| r.entry.category == category && r.window_day == label)
            .map(|r| r.entry.amount_cents)
            .sum()
    }

    pub(crate) fn check_limit_at(
        &self,
        amount_cents: u64,
        category: SpendCategory,
        policy: &TreasuryPolicy,
        now: DateTime<Utc>,
    ) -> LimitCheckResult {
        let (limit_hourly, limit_daily) = policy.caps_for(category);
        let current_hourly_spend = self.hourly_spend_at(category, now);
        let current_daily_spend = self.daily_spend_at(category, now);

        let reason = if let Some(cap) =
            limit_hourly.filter(|cap| current_hourly_spend + amount_cents > *cap)
        {
            Some(format!(
                "hourly {} cap: {} already spent, adding {} exceeds {}",
                category, current_hourly_spend, amount_cents, cap
            ))
        } else if let Some(cap) = limit_daily.filter(|cap| current_daily_spend + amount_cents > *cap)
        {
            Some(format!(
                "daily {} cap: {} already spent, adding {} exceeds {}",
                category, current_daily_spend, amount_cents, cap
            ))
        } else {
            None
        };

        LimitCheckResult {
            allowed: reason.is_none(),
            reason,
            current_hourly_spend,
            current_daily_spend,
            limit_hourly,
            limit_daily,
        }
    }

    pub(crate) fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut records = self.records.lock().expect("spend ledger lock poisoned");
        let before = records.len();
        records.retain(|r| r.recorded_at >= cutoff);
        let removed = before - records.len();

        debug!(removed, "pruned spend records");
        removed
    }
}

impl SpendTracker for MemorySpendLedger {
    fn record_spend(&self, entry: SpendEntry) {
        self.record_at(entry, Utc::now());
    }

    fn get_hourly_spend(&self, category: SpendCategory) -> u64 {
        self.hourly_spend_at(category, Utc::now())
    }

    fn get_daily_spend(&self, category: SpendCategory) -> u64 {
        self.daily_spend_at(category, Utc::now())
    }

    fn get_total_spend(&self, category: SpendCategory, since: DateTime<Utc>) -> u64 {
        self.records
            .lock()
            .expect("spend ledger lock poisoned")
            .iter()
            .filter(|r| r.entry.category == category && r.recorded_at >= since)
            .map(|r| r.entry.amount_cents)
            .sum()
    }

    fn check_limit(
        &self,
        amount_cents: u64,
        category: SpendCategory,
        policy: &TreasuryPolicy,
    ) -> LimitCheckResult {
        self.check_limit_at(amount_cents, category, policy, Utc::now())
    }

    fn prune_old_records(&self, retention_days: u32) -> usize {
        self.prune_before(Utc::now() - Duration::days(i64::from(retention_days)))
    }
}
