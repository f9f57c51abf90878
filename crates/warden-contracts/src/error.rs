//! Runtime error types for the WARDEN policy pipeline.
//!
//! All fallible operations in the pipeline return `WardenResult<T>`.
//! Note what is *not* an error: a rule returning `deny` or `quarantine` is
//! the system doing its job and is expressed as a `RuleVerdict` value.

use thiserror::Error;

/// The unified error type for the WARDEN policy engine.
#[derive(Debug, Error)]
pub enum WardenError {
    /// A required configuration value is missing or invalid.
    ///
    /// Raised at construction time, before any request is evaluated — an
    /// engine that starts in a broken state is worse than one that refuses
    /// to start.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The decision log could not persist a row.
    #[error("decision log write failed: {reason}")]
    AuditWrite { reason: String },

    /// A read against the decision log failed.
    #[error("decision log query failed: {reason}")]
    StoreQuery { reason: String },

    /// A rule's own evaluation failed.
    ///
    /// The engine treats this as "no opinion" from the faulting rule and
    /// continues the walk; the fault is counted and logged, never allowed
    /// to abort the pipeline.
    #[error("rule '{rule}' failed to evaluate: {reason}")]
    RuleFault { rule: String, reason: String },
}

/// Convenience alias used throughout the WARDEN crates.
pub type WardenResult<T> = Result<T, WardenError>;
