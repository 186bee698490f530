//! Custodial dual-denomination ledger
//!
//! This crate implements the accounting and price-conversion engine for a
//! custodial ledger holding a native unit and a stable reference unit, with a
//! global USD-equivalent cap and a per-withdrawal threshold.
//!
//! # Modules
//! - `errors`: Ledger error taxonomy
//! - `events`: Events emitted by committed operations
//! - `security`: Execution lock, pause guard, access gate
//! - `config`: Immutable cap / threshold / minimum configuration
//! - `oracle`: Price source gateway with sign and heartbeat checks
//! - `converter`: Native → USD-equivalent conversion
//! - `store`: Balance table, aggregate total, counters
//! - `policy`: Deposit and withdrawal validators
//! - `coordinator`: The `Ledger` and its transactional entry points
//! - `snapshot`: Persisted state and restore
//! - `transport`: In-memory wallets, reserve and allowances
//!
//! # Version
//! v0.1.0

pub mod errors;
pub mod events;
pub mod security;
pub mod config;
pub mod oracle;
pub mod converter;
pub mod store;
pub mod policy;
pub mod coordinator;
pub mod snapshot;
pub mod transport;

pub use config::LedgerConfig;
pub use coordinator::{InboundCall, Ledger, LedgerState, ValueTransport};
pub use errors::{LedgerError, OracleError, TransportError};
pub use oracle::{ManualPriceFeed, PriceFeed};
pub use snapshot::LedgerSnapshot;
pub use transport::InMemoryTransport;

/// Ledger ABI version: frozen after release
pub const LEDGER_ABI_VERSION: &str = "1.0.0";
