//! Ledger error types
//!
//! Error taxonomy for oracle reads, policy validation, value transfer,
//! authorization and snapshot persistence.

use thiserror::Error;
use types::denomination::Denomination;
use types::ids::HolderId;

/// Failure reported by a price feed itself, before any validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Feed unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Feed has no completed round")]
    NoRound,
}

/// Oracle validation errors. Always fatal for the enclosing operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Oracle reported a non-positive price: {price}")]
    Invalid { price: i128 },

    #[error("Oracle price is stale: updated at {updated_at}, now {now}, heartbeat {heartbeat}s")]
    Stale {
        updated_at: i64,
        now: i64,
        heartbeat: i64,
    },

    #[error("Oracle unavailable: {0}")]
    Unavailable(#[from] FeedError),
}

/// External value-transfer failure returned by a transport.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Transfer failed: {reason}")]
pub struct TransportError {
    pub reason: String,
}

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Top-level ledger error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    // ─── Validation (caller-recoverable) ───
    #[error("Amount must be non-zero (holder {holder})")]
    ZeroAmount { holder: HolderId },

    #[error("Deposit below minimum: holder {holder}, amount {amount}, minimum {minimum}")]
    BelowMinimum {
        holder: HolderId,
        amount: u128,
        minimum: u128,
    },

    #[error("Global cap exceeded: holder {holder}, aggregate {aggregate} + {usd_value} > cap {cap}")]
    CapExceeded {
        holder: HolderId,
        usd_value: u128,
        aggregate: u128,
        cap: u128,
    },

    #[error("Withdrawal threshold exceeded: holder {holder}, usd value {usd_value} > threshold {threshold}")]
    ThresholdExceeded {
        holder: HolderId,
        usd_value: u128,
        threshold: u128,
    },

    #[error("Insufficient {denomination} funds: holder {holder}, requested {requested}, available {available}")]
    InsufficientFunds {
        holder: HolderId,
        denomination: Denomination,
        requested: u128,
        available: u128,
    },

    #[error("Transfer authorization insufficient: holder {holder}, required {required}, allowance {allowance}")]
    AuthorizationInsufficient {
        holder: HolderId,
        required: u128,
        allowance: u128,
    },

    // ─── Oracle ───
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    // ─── Transfer ───
    #[error("Transfer rejected for holder {holder}: {reason}")]
    TransferRejected { holder: HolderId, reason: String },

    // ─── Authorization ───
    #[error("Caller {caller} is not permitted to perform this call")]
    NonPermittedAccess { caller: HolderId },

    #[error("Operation not permitted: {reason}")]
    NonPermittedOperation { reason: String },

    // ─── State ───
    #[error("Ledger is paused")]
    Paused,

    #[error("Ledger must be paused for this operation")]
    NotPaused,

    #[error("Reentrant call rejected: a transfer operation is already in flight")]
    ReentrantCall,

    #[error("Arithmetic overflow in ledger calculation")]
    Overflow,

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Price source mismatch: expected {expected}, supplied {supplied}")]
    SourceMismatch { expected: String, supplied: String },
}

impl LedgerError {
    /// Whether this is an expected validation outcome the caller can correct.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::ZeroAmount { .. }
                | LedgerError::BelowMinimum { .. }
                | LedgerError::CapExceeded { .. }
                | LedgerError::ThresholdExceeded { .. }
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::AuthorizationInsufficient { .. }
        )
    }

    /// Stable machine-readable name of the variant.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::ZeroAmount { .. } => "ZERO_AMOUNT",
            LedgerError::BelowMinimum { .. } => "BELOW_MINIMUM",
            LedgerError::CapExceeded { .. } => "CAP_EXCEEDED",
            LedgerError::ThresholdExceeded { .. } => "THRESHOLD_EXCEEDED",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::AuthorizationInsufficient { .. } => "AUTHORIZATION_INSUFFICIENT",
            LedgerError::Oracle(OracleError::Invalid { .. }) => "ORACLE_INVALID",
            LedgerError::Oracle(OracleError::Stale { .. }) => "ORACLE_STALE",
            LedgerError::Oracle(OracleError::Unavailable(_)) => "ORACLE_UNAVAILABLE",
            LedgerError::TransferRejected { .. } => "TRANSFER_REJECTED",
            LedgerError::NonPermittedAccess { .. } => "NON_PERMITTED_ACCESS",
            LedgerError::NonPermittedOperation { .. } => "NON_PERMITTED_OPERATION",
            LedgerError::Paused => "PAUSED",
            LedgerError::NotPaused => "NOT_PAUSED",
            LedgerError::ReentrantCall => "REENTRANT_CALL",
            LedgerError::Overflow => "OVERFLOW",
            LedgerError::InvalidConfig { .. } => "INVALID_CONFIG",
            LedgerError::SourceMismatch { .. } => "SOURCE_MISMATCH",
        }
    }
}

/// Snapshot persistence errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Snapshot checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch { expected: String, computed: String },

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Snapshot state inconsistent: {reason}")]
    Inconsistent { reason: String },

    #[error("Snapshot rejected: {0}")]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_stale_display() {
        let err = OracleError::Stale {
            updated_at: 1_000,
            now: 5_000,
            heartbeat: 3600,
        };
        assert!(err.to_string().contains("3600"));
    }

    #[test]
    fn test_ledger_error_from_oracle() {
        let oracle_err = OracleError::Invalid { price: -1 };
        let ledger_err: LedgerError = oracle_err.into();
        assert!(matches!(ledger_err, LedgerError::Oracle(_)));
    }

    #[test]
    fn test_oracle_error_from_feed() {
        let err: OracleError = FeedError::NoRound.into();
        assert_eq!(err, OracleError::Unavailable(FeedError::NoRound));
    }

    #[test]
    fn test_insufficient_funds_display() {
        let err = LedgerError::InsufficientFunds {
            holder: HolderId::new(),
            denomination: Denomination::Native,
            requested: 10,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("NATIVE"));
        assert!(msg.contains("requested 10"));
    }

    #[test]
    fn test_validation_classification() {
        let holder = HolderId::new();
        assert!(LedgerError::ZeroAmount { holder }.is_validation());
        assert!(!LedgerError::ReentrantCall.is_validation());
        assert!(!LedgerError::Oracle(OracleError::Invalid { price: 0 }).is_validation());
    }

    #[test]
    fn test_codes_distinguish_oracle_failures() {
        assert_eq!(
            LedgerError::Oracle(OracleError::Invalid { price: 0 }).code(),
            "ORACLE_INVALID"
        );
        assert_eq!(
            LedgerError::from(OracleError::from(FeedError::NoRound)).code(),
            "ORACLE_UNAVAILABLE"
        );
        assert_eq!(LedgerError::ReentrantCall.code(), "REENTRANT_CALL");
    }
}
