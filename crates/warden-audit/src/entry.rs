//! Decision-log entry types.
//!
//! `LogEntry` is a single entry in the hash chain — it wraps a
//! `DecisionRow` with sequence numbering and the SHA-256 hashes that make
//! tampering detectable. `LogExport` is the sealed record produced when the
//! log is exported for inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_contracts::log::DecisionRow;

/// A single entry in the SHA-256 hash chain of policy decisions.
///
/// Each entry commits to the previous entry via `prev_hash`, forming an
/// append-only chain. Modifying any field — including those of the embedded
/// `row` — invalidates `this_hash` and every subsequent `prev_hash`, which
/// `verify_chain` detects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonically increasing position in the chain, starting at 0.
    pub sequence: u64,

    /// The immutable decision row produced by the engine.
    pub row: DecisionRow,

    /// SHA-256 hash (hex) of the previous entry, or `GENESIS_HASH` for the
    /// first entry.
    pub prev_hash: String,

    /// SHA-256 hash (hex) of this entry's canonical content.
    ///
    /// Computed by `hash_entry()` over (sequence, prev_hash, canonical JSON
    /// of row).
    pub this_hash: String,
}

impl LogEntry {
    /// The sentinel `prev_hash` used for the first entry in every chain.
    ///
    /// 64 hex zeros — a value that can never be the SHA-256 of real data,
    /// making genesis detection unambiguous.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed export of the decision log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogExport {
    /// All entries in chain order (sequence 0 first).
    pub entries: Vec<LogEntry>,

    /// Wall-clock time (UTC) the export was taken.
    pub exported_at: DateTime<Utc>,

    /// The `this_hash` of the last entry. Empty string if the log is empty.
    pub terminal_hash: String,
}
