//! # warden-audit
//!
//! Immutable, append-only, SHA-256 hash-chained decision log for the
//! WARDEN policy engine.
//!
//! ## Overview
//!
//! Every decision the engine logs is wrapped in a `LogEntry` that links to
//! the previous entry via its SHA-256 hash. Tampering with any entry —
//! even a single byte — breaks the chain and is detected by `verify_chain`.
//! The same log doubles as the query surface for rate-limit rules.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_audit::MemoryDecisionLog;
//! use warden_core::traits::DecisionStore;
//!
//! let log = MemoryDecisionLog::new();
//! log.insert(&row)?;
//!
//! assert!(log.verify_integrity());
//! let export = log.export();
//! ```

pub mod chain;
pub mod entry;
pub mod memory;

pub use chain::{hash_entry, verify_chain};
pub use entry::{LogEntry, LogExport};
pub use memory::MemoryDecisionLog;

// ── Tests ─────────────────────────────────────────────────────────────────────
