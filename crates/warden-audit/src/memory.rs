//! In-memory implementation of `DecisionStore`.
//!
//! `MemoryDecisionLog` keeps all entries in a `Vec` protected by a
//! `Mutex`, making it safe to share behind an `Arc` while the engine calls
//! `insert()` and rate-limit rules call the query methods.
//!
//! Use `export()` to obtain a sealed `LogExport`, and `verify_integrity()`
//! at any time to confirm the chain has not been tampered with in memory.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use warden_contracts::{
    error::{WardenError, WardenResult},
    log::DecisionRow,
    policy::PolicyAction,
};
use warden_core::traits::DecisionStore;

use crate::{
    chain::{hash_entry, verify_chain},
    entry::{LogEntry, LogExport},
};

// ── Internal mutable state ────────────────────────────────────────────────────

/// The mutable interior of a `MemoryDecisionLog`.
pub(crate) struct LogState {
    /// All entries written so far, in append order.
    pub(crate) entries: Vec<LogEntry>,

    /// The next sequence number to assign (starts at 0).
    pub(crate) sequence: u64,

    /// The `this_hash` of the last written entry, or `GENESIS_HASH` before
    /// any entry has been written.
    pub(crate) last_hash: String,
}

// ── Public log ────────────────────────────────────────────────────────────────

/// An in-memory, append-only decision log backed by a SHA-256 hash chain.
pub struct MemoryDecisionLog {
    pub(crate) state: Mutex<LogState>,
}

impl MemoryDecisionLog {
    /// Create an empty log.
    ///
    /// The internal `last_hash` is initialized to `LogEntry::GENESIS_HASH`
    /// so the first entry's `prev_hash` is automatically correct.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LogState {
                entries: Vec::new(),
                sequence: 0,
                last_hash: LogEntry::GENESIS_HASH.to_string(),
            }),
        }
    }

    /// Export a sealed `LogExport` containing all entries written so far.
    pub fn export(&self) -> LogExport {
        let state = self.state.lock().expect("decision log lock poisoned");
        let terminal_hash = state
            .entries
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();

        LogExport {
            entries: state.entries.clone(),
            exported_at: Utc::now(),
            terminal_hash,
        }
    }

    /// Verify that the in-memory chain has not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        let state = self.state.lock().expect("decision log lock poisoned");
        verify_chain(&state.entries)
    }

    /// How many entries the log holds.
    pub fn len(&self) -> usize {
        self.state.lock().expect("decision log lock poisoned").entries.len()
    }

    /// True when no entry has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryDecisionLog {
    fn default() -> Self {
        Self::new()
    }
}

// ── DecisionStore impl ────────────────────────────────────────────────────────

impl DecisionStore for MemoryDecisionLog {
    /// Append one decision row to the hash chain.
    ///
    /// Computes `this_hash` from (sequence, prev_hash, row), wraps the row
    /// in a `LogEntry`, appends it, then advances the sequence counter and
    /// `last_hash`.
    fn insert(&self, row: &DecisionRow) -> WardenResult<()> {
        let mut state = self.state.lock().map_err(|e| WardenError::AuditWrite {
            reason: format!("decision log lock poisoned: {}", e),
        })?;

        let prev_hash = state.last_hash.clone();
        let sequence = state.sequence;

        let this_hash = hash_entry(sequence, row, &prev_hash);

        let entry = LogEntry {
            sequence,
            row: row.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        };

        state.entries.push(entry);
        state.sequence += 1;
        state.last_hash = this_hash;

        debug!(sequence, tool = %row.tool_name, decision = ?row.decision, "decision logged");

        Ok(())
    }

    fn count_allowed_since(&self, tool_name: &str, since: DateTime<Utc>) -> WardenResult<u64> {
        let state = self.state.lock().map_err(|e| WardenError::StoreQuery {
            reason: format!("decision log lock poisoned: {}", e),
        })?;

        let count = state
            .entries
            .iter()
            .filter(|e| {
                e.row.tool_name == tool_name
                    && e.row.decision == PolicyAction::Allow
                    && e.row.created_at >= since
            })
            .count();

        Ok(count as u64)
    }

    fn last_allowed_at(&self, tool_names: &[&str]) -> WardenResult<Option<DateTime<Utc>>> {
        let state = self.state.lock().map_err(|e| WardenError::StoreQuery {
            reason: format!("decision log lock poisoned: {}", e),
        })?;

        let last = state
            .entries
            .iter()
            .rev()
            .find(|e| {
                e.row.decision == PolicyAction::Allow
                    && tool_names.contains(&e.row.tool_name.as_str())
            })
            .map(|e| e.row.created_at);

        Ok(last)
    }
}
