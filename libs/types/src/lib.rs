//! Types library for the custodial ledger
//!
//! This library provides the identifier, denomination and amount types shared
//! by the ledger engine and the simulation tooling.
//!
//! # Version
//! v1.0.0
//!
//! # Modules
//! - `ids`: Unique identifiers (HolderId, FeedId, OperationId)
//! - `denomination`: The two custodied units and their precision
//! - `numeric`: Integer amount helpers and decimal presentation

// Public modules
pub mod ids;
pub mod denomination;
pub mod numeric;
