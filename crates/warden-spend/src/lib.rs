//! # warden-spend
//!
//! Windowed spend tracking for the WARDEN policy engine.
//!
//! ## Overview
//!
//! This crate provides [`MemorySpendLedger`], the reference implementation
//! of the [`SpendTracker`](warden_core::traits::SpendTracker) trait. Spend
//! is tallied per category against two independent windows — the current
//! wall-clock hour and the current wall-clock day — each keyed by a
//! calendar label derived from the entry's timestamp.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_spend::MemorySpendLedger;
//! use warden_core::traits::SpendTracker;
//!
//! let ledger = MemorySpendLedger::new();
//! ledger.record_spend(entry);
//! let check = ledger.check_limit(500, SpendCategory::Transfer, &policy);
//! ```

pub mod memory;
pub mod window;

pub use memory::MemorySpendLedger;

// ── Tests ─────────────────────────────────────────────────────────────────────
