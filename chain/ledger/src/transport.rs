//! In-memory value transport
//!
//! Models the platform side of custody: holder wallets outside the ledger,
//! the custodial reserve the ledger physically holds, and stable-unit
//! transfer authorizations. Used by tests and the simulation harness to check
//! that recorded balances never exceed what custody actually holds.

use std::collections::BTreeMap;

use tracing::debug;
use types::denomination::Denomination;
use types::ids::HolderId;

use crate::coordinator::{Ledger, ValueTransport};
use crate::errors::{LedgerError, TransportError};
use crate::events::LedgerEvent;

/// Wallets, reserve and allowances for both denominations.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    wallets: BTreeMap<(Denomination, HolderId), u128>,
    reserve: BTreeMap<Denomination, u128>,
    allowances: BTreeMap<HolderId, u128>,
    rejection: Option<String>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `holder` external funds.
    pub fn fund_wallet(&mut self, holder: HolderId, denomination: Denomination, amount: u128) {
        let wallet = self.wallets.entry((denomination, holder)).or_insert(0);
        *wallet = wallet.saturating_add(amount);
    }

    /// External (non-custodied) funds of `holder`.
    pub fn wallet(&self, holder: &HolderId, denomination: Denomination) -> u128 {
        self.wallets
            .get(&(denomination, *holder))
            .copied()
            .unwrap_or(0)
    }

    /// What custody physically holds.
    pub fn reserve(&self, denomination: Denomination) -> u128 {
        self.reserve.get(&denomination).copied().unwrap_or(0)
    }

    /// Set `holder`'s stable-unit authorization for the ledger.
    pub fn approve(&mut self, holder: HolderId, amount: u128) {
        self.allowances.insert(holder, amount);
    }

    /// Fail every subsequent send and pull with `reason`.
    pub fn reject_transfers(&mut self, reason: impl Into<String>) {
        self.rejection = Some(reason.into());
    }

    /// Stop failing sends and pulls.
    pub fn accept_transfers(&mut self) {
        self.rejection = None;
    }

    /// Send native value from `holder`'s wallet along with a deposit call.
    ///
    /// If the ledger rejects the deposit the value goes back to the wallet,
    /// as the platform would revert the whole call.
    pub fn deposit_native(
        &mut self,
        ledger: &mut Ledger,
        holder: HolderId,
        amount: u128,
        now: i64,
    ) -> Result<LedgerEvent, LedgerError> {
        self.move_funds(holder, Denomination::Native, amount, true)
            .map_err(|e| LedgerError::TransferRejected {
                holder,
                reason: e.reason,
            })?;

        let result = ledger.deposit_native(holder, amount, now);
        if result.is_err() {
            // Cannot fail: the same amount was just moved the other way.
            let _ = self.move_funds(holder, Denomination::Native, amount, false);
        }
        result
    }

    /// Move between a wallet and the reserve. `inbound` is wallet → reserve.
    fn move_funds(
        &mut self,
        holder: HolderId,
        denomination: Denomination,
        amount: u128,
        inbound: bool,
    ) -> Result<(), TransportError> {
        let wallet = self.wallet(&holder, denomination);
        let reserve = self.reserve(denomination);

        let (wallet, reserve) = if inbound {
            let wallet = wallet
                .checked_sub(amount)
                .ok_or_else(|| TransportError::new("wallet balance too low"))?;
            (wallet, reserve.saturating_add(amount))
        } else {
            let reserve = reserve
                .checked_sub(amount)
                .ok_or_else(|| TransportError::new("custodial reserve exhausted"))?;
            (wallet.saturating_add(amount), reserve)
        };

        self.wallets.insert((denomination, holder), wallet);
        self.reserve.insert(denomination, reserve);
        Ok(())
    }

    fn check_accepting(&self) -> Result<(), TransportError> {
        match &self.rejection {
            Some(reason) => Err(TransportError::new(reason.clone())),
            None => Ok(()),
        }
    }
}

impl ValueTransport for InMemoryTransport {
    fn send(
        &mut self,
        _ledger: &mut Ledger,
        to: HolderId,
        denomination: Denomination,
        amount: u128,
    ) -> Result<(), TransportError> {
        self.check_accepting()?;
        self.move_funds(to, denomination, amount, false)?;
        debug!(to = %to, denomination = %denomination, amount = %amount, "Value sent");
        Ok(())
    }

    fn allowance(&self, from: &HolderId) -> u128 {
        self.allowances.get(from).copied().unwrap_or(0)
    }

    fn pull(
        &mut self,
        _ledger: &mut Ledger,
        from: HolderId,
        amount: u128,
    ) -> Result<(), TransportError> {
        self.check_accepting()?;
        let allowance = self.allowance(&from);
        let remaining = allowance
            .checked_sub(amount)
            .ok_or_else(|| TransportError::new("allowance exceeded"))?;
        self.move_funds(from, Denomination::Stable, amount, true)?;
        self.allowances.insert(from, remaining);
        debug!(from = %from, amount = %amount, "Stable units pulled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::oracle::ManualPriceFeed;

    const NOW: i64 = 1_700_000_000;

    fn ledger() -> Ledger {
        let feed = ManualPriceFeed::new("feed:ETH/USD", 2_000_00000000, NOW);
        Ledger::with_owner(LedgerConfig::default(), Box::new(feed), HolderId::new()).unwrap()
    }

    #[test]
    fn test_native_deposit_moves_wallet_to_reserve() {
        let mut ledger = ledger();
        let mut transport = InMemoryTransport::new();
        let holder = HolderId::new();
        transport.fund_wallet(holder, Denomination::Native, 5_000_000_000_000_000);

        transport
            .deposit_native(&mut ledger, holder, 2_000_000_000_000_000, NOW)
            .unwrap();
        assert_eq!(transport.wallet(&holder, Denomination::Native), 3_000_000_000_000_000);
        assert_eq!(transport.reserve(Denomination::Native), 2_000_000_000_000_000);
    }

    #[test]
    fn test_rejected_native_deposit_refunds_wallet() {
        let mut ledger = ledger();
        let mut transport = InMemoryTransport::new();
        let holder = HolderId::new();
        transport.fund_wallet(holder, Denomination::Native, 10);

        // Below the default minimum deposit.
        let result = transport.deposit_native(&mut ledger, holder, 10, NOW);
        assert!(matches!(result, Err(LedgerError::BelowMinimum { .. })));
        assert_eq!(transport.wallet(&holder, Denomination::Native), 10);
        assert_eq!(transport.reserve(Denomination::Native), 0);
    }

    #[test]
    fn test_native_deposit_without_funds() {
        let mut ledger = ledger();
        let mut transport = InMemoryTransport::new();
        let result = transport.deposit_native(&mut ledger, HolderId::new(), 1, NOW);
        assert!(matches!(result, Err(LedgerError::TransferRejected { .. })));
    }

    #[test]
    fn test_pull_consumes_allowance() {
        let mut ledger = ledger();
        let mut transport = InMemoryTransport::new();
        let holder = HolderId::new();
        transport.fund_wallet(holder, Denomination::Stable, 1_000);
        transport.approve(holder, 600);

        transport.pull(&mut ledger, holder, 400).unwrap();
        assert_eq!(transport.allowance(&holder), 200);
        assert_eq!(transport.reserve(Denomination::Stable), 400);
        assert!(transport.pull(&mut ledger, holder, 201).is_err());
    }

    #[test]
    fn test_send_limited_by_reserve() {
        let mut ledger = ledger();
        let mut transport = InMemoryTransport::new();
        let result = transport.send(&mut ledger, HolderId::new(), Denomination::Stable, 1);
        assert_eq!(result, Err(TransportError::new("custodial reserve exhausted")));
    }

    #[test]
    fn test_rejection_switch() {
        let mut ledger = ledger();
        let mut transport = InMemoryTransport::new();
        let holder = HolderId::new();
        transport.fund_wallet(holder, Denomination::Stable, 10);
        transport.approve(holder, 10);

        transport.reject_transfers("recipient reverted");
        assert_eq!(
            transport.pull(&mut ledger, holder, 5),
            Err(TransportError::new("recipient reverted"))
        );
        transport.accept_transfers();
        assert!(transport.pull(&mut ledger, holder, 5).is_ok());
    }
}
