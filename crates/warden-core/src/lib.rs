//! # warden-core
//!
//! The orchestrating half of the WARDEN policy engine.
//!
//! This crate provides:
//! - The three trait seams (`PolicyRule`, `SpendTracker`, `DecisionStore`)
//! - The `PolicyEngine` that selects, orders, and composes rule verdicts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{PolicyEngine, traits::{PolicyRule, SpendTracker, DecisionStore}};
//! ```

pub mod engine;
pub mod traits;

pub use engine::{derive_authority_level, hash_args, PolicyEngine};
