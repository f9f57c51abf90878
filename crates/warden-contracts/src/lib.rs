//! # warden-contracts
//!
//! Shared types, configuration, and contracts for the WARDEN policy and
//! transaction-guard engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions, the treasury configuration, and the
//! unified error type.

pub mod error;
pub mod log;
pub mod policy;
pub mod request;
pub mod spend;
pub mod tool;
pub mod treasury;

pub use error::{WardenError, WardenResult};
pub use log::DecisionRow;
pub use policy::{AuthorityLevel, InputSource, PolicyAction, PolicyDecision, RuleVerdict};
pub use request::{PolicyRequest, TurnContext};
pub use spend::{LimitCheckResult, SpendCategory, SpendEntry};
pub use tool::{RiskLevel, ToolCategory, ToolDescriptor, ToolSelector};
pub use treasury::TreasuryPolicy;
