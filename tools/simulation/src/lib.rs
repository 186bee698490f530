//! Custodial ledger simulation harness
//!
//! Deterministic, seeded simulation of the custodial ledger under random and
//! adversarial operation sequences.
//!
//! # Modules
//! - `config`: Run parameters
//! - `engine`: Seeded `SimLedger` with invariant checks
//! - `scenarios`: Random flow, oracle outage, reentrancy drain, cap saturation
//! - `metrics`: Accepted / rejected counters and value totals
//! - `export`: Results and metrics JSON export

pub mod config;
pub mod engine;
pub mod scenarios;
pub mod metrics;
pub mod export;

/// Crate version constant
pub const VERSION: &str = "0.1.0";
