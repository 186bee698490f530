//! Persisted ledger state
//!
//! Everything that must survive a restart, and nothing derived: balances,
//! aggregate total, counters, price-source address, pause flag, owner and
//! role assignments, configuration. The JSON envelope carries a SHA-256
//! checksum of the snapshot body, verified on load.
//!
//! The price feed itself is not persisted. It is supplied again on restore and
//! must carry the persisted address.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use types::denomination::Denomination;
use types::ids::{FeedId, HolderId};

use crate::config::LedgerConfig;
use crate::coordinator::Ledger;
use crate::errors::{LedgerError, SnapshotError};
use crate::oracle::{OracleGateway, PriceFeed};
use crate::security::{AccessControl, AccessGate, PauseGuard, Role};
use crate::store::LedgerStore;

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One balance table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub denomination: Denomination,
    pub holder: HolderId,
    pub amount: u128,
}

/// One role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub account: HolderId,
    pub role: Role,
}

/// Complete persisted state of a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub config: LedgerConfig,
    pub balances: Vec<BalanceRecord>,
    pub aggregate_total: u128,
    pub deposit_count: u64,
    pub withdrawal_count: u64,
    pub price_source: FeedId,
    pub paused: bool,
    pub owner: HolderId,
    pub roles: Vec<RoleAssignment>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEnvelope {
    checksum: String,
    snapshot: LedgerSnapshot,
}

impl LedgerSnapshot {
    /// Hex SHA-256 of the snapshot body's JSON encoding.
    pub fn checksum(&self) -> Result<String, SnapshotError> {
        let body = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&body)))
    }

    /// Encode with checksum.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        let envelope = SnapshotEnvelope {
            checksum: self.checksum()?,
            snapshot: self.clone(),
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Reject states no sequence of operations can reach: an aggregate above
    /// the cap, or two records for the same holder and denomination.
    pub fn check_consistency(&self) -> Result<(), SnapshotError> {
        if self.aggregate_total > self.config.global_cap {
            return Err(SnapshotError::Inconsistent {
                reason: format!(
                    "aggregate {} above cap {}",
                    self.aggregate_total, self.config.global_cap
                ),
            });
        }
        let mut seen = BTreeSet::new();
        for record in &self.balances {
            if !seen.insert((record.denomination, record.holder)) {
                return Err(SnapshotError::Inconsistent {
                    reason: format!(
                        "duplicate {} balance for holder {}",
                        record.denomination, record.holder
                    ),
                });
            }
        }
        Ok(())
    }

    /// Decode, then verify version and checksum.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let envelope: SnapshotEnvelope = serde_json::from_str(json)?;
        if envelope.snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(envelope.snapshot.version));
        }
        let computed = envelope.snapshot.checksum()?;
        if computed != envelope.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                expected: envelope.checksum,
                computed,
            });
        }
        Ok(envelope.snapshot)
    }
}

impl Ledger {
    /// Capture the persisted state. Refused while a transfer is in flight.
    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        self.ensure_idle()?;
        Ok(LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config,
            balances: self
                .store
                .entries()
                .map(|(denomination, holder, amount)| BalanceRecord {
                    denomination,
                    holder,
                    amount,
                })
                .collect(),
            aggregate_total: self.store.aggregate_total(),
            deposit_count: self.store.deposit_count(),
            withdrawal_count: self.store.withdrawal_count(),
            price_source: self.oracle.source_id(),
            paused: self.pause_guard.is_paused(),
            owner: self.access.owner(),
            roles: self
                .access
                .assignments()
                .into_iter()
                .map(|(account, role)| RoleAssignment { account, role })
                .collect(),
        })
    }

    /// Rebuild a ledger with the default `AccessControl`.
    pub fn restore(
        snapshot: LedgerSnapshot,
        price_feed: Box<dyn PriceFeed>,
    ) -> Result<Self, SnapshotError> {
        let assignments: Vec<(HolderId, Role)> = snapshot
            .roles
            .iter()
            .map(|r| (r.account, r.role))
            .collect();
        let access = AccessControl::from_assignments(snapshot.owner, &assignments);
        Self::restore_with_gate(snapshot, price_feed, Box::new(access))
    }

    /// Rebuild a ledger around a caller-supplied access gate, which is expected
    /// to already reflect the snapshot's owner and roles.
    pub fn restore_with_gate(
        snapshot: LedgerSnapshot,
        price_feed: Box<dyn PriceFeed>,
        access: Box<dyn AccessGate>,
    ) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        snapshot.config.validate()?;
        snapshot.check_consistency()?;

        let supplied = price_feed.id();
        if supplied != snapshot.price_source {
            return Err(LedgerError::SourceMismatch {
                expected: snapshot.price_source.to_string(),
                supplied: supplied.to_string(),
            }
            .into());
        }

        let store = LedgerStore::from_parts(
            snapshot
                .balances
                .iter()
                .map(|b| (b.denomination, b.holder, b.amount)),
            snapshot.aggregate_total,
            snapshot.deposit_count,
            snapshot.withdrawal_count,
        );

        info!(
            entries = snapshot.balances.len(),
            aggregate_total = %snapshot.aggregate_total,
            paused = snapshot.paused,
            price_source = %snapshot.price_source,
            "Ledger restored from snapshot"
        );

        Ok(Self::from_parts(
            snapshot.config,
            store,
            OracleGateway::new(price_feed),
            access,
            PauseGuard::with_state(snapshot.paused),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ManualPriceFeed;

    const NOW: i64 = 1_700_000_000;

    fn ledger_with_funds() -> (Ledger, HolderId, HolderId) {
        let owner = HolderId::new();
        let holder = HolderId::new();
        let feed = ManualPriceFeed::new("feed:ETH/USD", 2_000_00000000, NOW);
        let mut ledger = Ledger::with_owner(
            LedgerConfig::new(1_000_000_000_000, 10_000_000_000, 1).unwrap(),
            Box::new(feed),
            owner,
        )
        .unwrap();
        ledger
            .deposit_native(holder, 1_000_000_000_000_000_000, NOW)
            .unwrap();
        (ledger, owner, holder)
    }

    #[test]
    fn test_snapshot_captures_state() {
        let (ledger, owner, holder) = ledger_with_funds();
        let snap = ledger.snapshot().unwrap();
        assert_eq!(snap.version, SNAPSHOT_VERSION);
        assert_eq!(snap.owner, owner);
        assert_eq!(snap.aggregate_total, 2_000_000_000);
        assert_eq!(snap.deposit_count, 1);
        assert_eq!(
            snap.balances,
            vec![BalanceRecord {
                denomination: Denomination::Native,
                holder,
                amount: 1_000_000_000_000_000_000,
            }]
        );
    }

    #[test]
    fn test_restore_preserves_everything() {
        let (mut ledger, owner, holder) = ledger_with_funds();
        let pauser = HolderId::new();
        ledger.grant_role(owner, pauser, Role::Pauser).unwrap();
        ledger.pause(pauser).unwrap();

        let json = ledger.snapshot().unwrap().to_json().unwrap();
        let loaded = LedgerSnapshot::from_json(&json).unwrap();
        let feed = ManualPriceFeed::new("feed:ETH/USD", 2_000_00000000, NOW);
        let restored = Ledger::restore(loaded, Box::new(feed)).unwrap();

        assert_eq!(restored.query_state(), ledger.query_state());
        assert_eq!(
            restored.query_denomination_balance(&holder, Denomination::Native),
            1_000_000_000_000_000_000
        );
        assert!(restored.has_role(&pauser, Role::Pauser));
        assert_eq!(restored.owner(), owner);
        assert_eq!(restored.store(), ledger.store());
    }

    #[test]
    fn test_restore_rejects_other_feed() {
        let (ledger, _, _) = ledger_with_funds();
        let snap = ledger.snapshot().unwrap();
        let other = ManualPriceFeed::new("feed:other", 2_000_00000000, NOW);
        let err = Ledger::restore(snap, Box::new(other)).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Ledger(LedgerError::SourceMismatch { .. })
        ));
    }

    #[test]
    fn test_tampered_snapshot_rejected() {
        let (ledger, _, _) = ledger_with_funds();
        let json = ledger.snapshot().unwrap().to_json().unwrap();
        let tampered = json.replace("\"aggregate_total\": 2000000000", "\"aggregate_total\": 1");
        assert_ne!(json, tampered);
        assert!(matches!(
            LedgerSnapshot::from_json(&tampered),
            Err(SnapshotError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_restore_rejects_aggregate_above_cap() {
        let (ledger, _, _) = ledger_with_funds();
        let mut snap = ledger.snapshot().unwrap();
        snap.aggregate_total = snap.config.global_cap + 1;
        // A re-signed body passes the checksum.
        let loaded = LedgerSnapshot::from_json(&snap.to_json().unwrap()).unwrap();
        let feed = ManualPriceFeed::new("feed:ETH/USD", 2_000_00000000, NOW);
        let err = Ledger::restore(loaded, Box::new(feed)).unwrap_err();
        assert!(matches!(err, SnapshotError::Inconsistent { .. }));
    }

    #[test]
    fn test_restore_accepts_aggregate_at_cap() {
        let (ledger, _, _) = ledger_with_funds();
        let mut snap = ledger.snapshot().unwrap();
        snap.aggregate_total = snap.config.global_cap;
        let feed = ManualPriceFeed::new("feed:ETH/USD", 2_000_00000000, NOW);
        let restored = Ledger::restore(snap, Box::new(feed)).unwrap();
        assert_eq!(restored.query_state().aggregate_total, 1_000_000_000_000);
    }

    #[test]
    fn test_restore_rejects_duplicate_balance_records() {
        let (ledger, _, _) = ledger_with_funds();
        let mut snap = ledger.snapshot().unwrap();
        let holder = HolderId::new();
        snap.balances = vec![
            BalanceRecord {
                denomination: Denomination::Stable,
                holder,
                amount: 100,
            },
            BalanceRecord {
                denomination: Denomination::Stable,
                holder,
                amount: 7,
            },
        ];
        snap.aggregate_total = 107;
        let loaded = LedgerSnapshot::from_json(&snap.to_json().unwrap()).unwrap();
        let feed = ManualPriceFeed::new("feed:ETH/USD", 2_000_00000000, NOW);
        let err = Ledger::restore(loaded, Box::new(feed)).unwrap_err();
        match err {
            SnapshotError::Inconsistent { reason } => assert!(reason.contains("duplicate")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let (ledger, _, _) = ledger_with_funds();
        let mut snap = ledger.snapshot().unwrap();
        snap.version = 99;
        let json = snap.to_json().unwrap();
        assert!(matches!(
            LedgerSnapshot::from_json(&json),
            Err(SnapshotError::UnsupportedVersion(99))
        ));
    }
}
