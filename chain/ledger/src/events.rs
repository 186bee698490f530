//! Ledger events
//!
//! Events are immutable records emitted by committed operations. They are the
//! only history the ledger keeps; the store itself is mutated in place.

use serde::{Deserialize, Serialize};
use types::denomination::Denomination;
use types::ids::{FeedId, HolderId, OperationId};

use crate::security::Role;

/// Deposit credited to a holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositSucceeded {
    pub operation_id: OperationId,
    pub holder: HolderId,
    pub denomination: Denomination,
    pub amount: u128,
    pub usd_value: u128,
}

/// Withdrawal debited from a holder and paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalSucceeded {
    pub operation_id: OperationId,
    pub holder: HolderId,
    pub denomination: Denomination,
    pub amount: u128,
    pub usd_value: u128,
}

/// Price source replaced by an authorized caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSourceUpdated {
    pub previous: FeedId,
    pub current: FeedId,
    pub updated_by: HolderId,
}

/// Ownership moved to a new holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdministrationTransferred {
    pub previous_owner: HolderId,
    pub new_owner: HolderId,
}

/// Enum wrapper for all ledger events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    DepositSucceeded(DepositSucceeded),
    WithdrawalSucceeded(WithdrawalSucceeded),
    PriceSourceUpdated(PriceSourceUpdated),
    Paused { by: HolderId },
    Unpaused { by: HolderId },
    AdministrationTransferred(AdministrationTransferred),
    RoleGranted { role: Role, account: HolderId, by: HolderId },
    RoleRevoked { role: Role, account: HolderId, by: HolderId },
}

impl LedgerEvent {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            LedgerEvent::DepositSucceeded(_) => "deposit_succeeded",
            LedgerEvent::WithdrawalSucceeded(_) => "withdrawal_succeeded",
            LedgerEvent::PriceSourceUpdated(_) => "price_source_updated",
            LedgerEvent::Paused { .. } => "paused",
            LedgerEvent::Unpaused { .. } => "unpaused",
            LedgerEvent::AdministrationTransferred(_) => "administration_transferred",
            LedgerEvent::RoleGranted { .. } => "role_granted",
            LedgerEvent::RoleRevoked { .. } => "role_revoked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_event_json_shape() {
        let event = LedgerEvent::DepositSucceeded(DepositSucceeded {
            operation_id: OperationId::new(),
            holder: HolderId::new(),
            denomination: Denomination::Native,
            amount: 1_000_000_000_000_000_000,
            usd_value: 2_000_000_000,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["DepositSucceeded"]["denomination"], "NATIVE");
        assert_eq!(json["DepositSucceeded"]["usd_value"], 2_000_000_000u64);
    }

    #[test]
    fn test_labels() {
        let holder = HolderId::new();
        assert_eq!(LedgerEvent::Paused { by: holder }.label(), "paused");
        let granted = LedgerEvent::RoleGranted {
            role: Role::Pauser,
            account: holder,
            by: holder,
        };
        assert_eq!(granted.label(), "role_granted");
    }
}
