//! Ledger store: balance table, aggregate total, counters
//!
//! Balances are keyed by `(Denomination, HolderId)` and hold smallest-unit
//! integers. The aggregate total is the running USD-equivalent sum recorded at
//! the time of each deposit and withdrawal; it is never recomputed from live
//! prices. Entries are never removed, only driven to zero.

use std::collections::BTreeMap;

use tracing::warn;
use types::denomination::Denomination;
use types::ids::HolderId;

use crate::errors::LedgerError;

/// Values of every field one operation can touch, captured before commit.
///
/// Restoring it undoes the operation exactly, without inverse arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Checkpoint {
    denomination: Denomination,
    holder: HolderId,
    balance: Option<u128>,
    aggregate_total: u128,
    deposit_count: u64,
    withdrawal_count: u64,
}

/// The balance table and its aggregate counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStore {
    balances: BTreeMap<(Denomination, HolderId), u128>,
    aggregate_total: u128,
    deposit_count: u64,
    withdrawal_count: u64,
}

impl LedgerStore {
    /// An empty, zeroed store.
    pub fn new() -> Self {
        Self::default()
    }

    // ───────────────────────── Balances ─────────────────────────

    /// Balance of `holder` in `denomination`. Unknown holders have zero.
    pub fn get(&self, denomination: Denomination, holder: &HolderId) -> u128 {
        self.balances
            .get(&(denomination, *holder))
            .copied()
            .unwrap_or(0)
    }

    /// Add `amount` to a balance, returning the new balance.
    pub fn credit(
        &mut self,
        denomination: Denomination,
        holder: HolderId,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        let current = self.balances.entry((denomination, holder)).or_insert(0);
        let updated = current.checked_add(amount).ok_or(LedgerError::Overflow)?;
        *current = updated;
        Ok(updated)
    }

    /// Subtract `amount` from a balance, returning the new balance.
    ///
    /// Fails without touching the entry if the balance is too small.
    pub fn debit(
        &mut self,
        denomination: Denomination,
        holder: HolderId,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        let available = self.get(denomination, &holder);
        let updated = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                holder,
                denomination,
                requested: amount,
                available,
            })?;
        self.balances.insert((denomination, holder), updated);
        Ok(updated)
    }

    /// Sum of every holder's balance in `denomination`.
    pub fn total_for(&self, denomination: Denomination) -> u128 {
        self.balances
            .iter()
            .filter(|((d, _), _)| *d == denomination)
            .fold(0u128, |acc, (_, amount)| acc.saturating_add(*amount))
    }

    /// All entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (Denomination, HolderId, u128)> + '_ {
        self.balances.iter().map(|((d, h), a)| (*d, *h, *a))
    }

    // ───────────────────────── Aggregate ─────────────────────────

    /// Running USD-equivalent total.
    pub fn aggregate_total(&self) -> u128 {
        self.aggregate_total
    }

    /// Record deposited USD-equivalent value.
    pub fn add_to_aggregate(&mut self, usd_value: u128) -> Result<u128, LedgerError> {
        self.aggregate_total = self
            .aggregate_total
            .checked_add(usd_value)
            .ok_or(LedgerError::Overflow)?;
        Ok(self.aggregate_total)
    }

    /// Remove withdrawn USD-equivalent value.
    ///
    /// A native withdrawal is valued at the withdrawal-time price, which can
    /// exceed what was recorded at deposit time; the total clamps at zero.
    /// Value still held by other holders then stops counting toward the cap
    /// until it is withdrawn.
    pub fn remove_from_aggregate(&mut self, usd_value: u128) -> u128 {
        if usd_value > self.aggregate_total {
            warn!(
                aggregate = %self.aggregate_total,
                removed = %usd_value,
                "Withdrawal value exceeds recorded aggregate; clamping to zero"
            );
        }
        self.aggregate_total = self.aggregate_total.saturating_sub(usd_value);
        self.aggregate_total
    }

    // ───────────────────────── Counters ─────────────────────────

    pub fn deposit_count(&self) -> u64 {
        self.deposit_count
    }

    pub fn withdrawal_count(&self) -> u64 {
        self.withdrawal_count
    }

    /// Count one deposit. Saturates at `u64::MAX`.
    pub fn increment_deposits(&mut self) -> u64 {
        self.deposit_count = saturating_increment(self.deposit_count, "deposit_count");
        self.deposit_count
    }

    /// Count one withdrawal. Saturates at `u64::MAX`.
    pub fn increment_withdrawals(&mut self) -> u64 {
        self.withdrawal_count = saturating_increment(self.withdrawal_count, "withdrawal_count");
        self.withdrawal_count
    }

    // ───────────────────────── Restore / rollback ─────────────────────────

    /// Rebuild a store from persisted parts.
    pub(crate) fn from_parts(
        entries: impl IntoIterator<Item = (Denomination, HolderId, u128)>,
        aggregate_total: u128,
        deposit_count: u64,
        withdrawal_count: u64,
    ) -> Self {
        Self {
            balances: entries.into_iter().map(|(d, h, a)| ((d, h), a)).collect(),
            aggregate_total,
            deposit_count,
            withdrawal_count,
        }
    }

    pub(crate) fn checkpoint(&self, denomination: Denomination, holder: HolderId) -> Checkpoint {
        Checkpoint {
            denomination,
            holder,
            balance: self.balances.get(&(denomination, holder)).copied(),
            aggregate_total: self.aggregate_total,
            deposit_count: self.deposit_count,
            withdrawal_count: self.withdrawal_count,
        }
    }

    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        let key = (checkpoint.denomination, checkpoint.holder);
        match checkpoint.balance {
            Some(balance) => {
                self.balances.insert(key, balance);
            }
            None => {
                self.balances.remove(&key);
            }
        }
        self.aggregate_total = checkpoint.aggregate_total;
        self.deposit_count = checkpoint.deposit_count;
        self.withdrawal_count = checkpoint.withdrawal_count;
    }
}

fn saturating_increment(value: u64, counter: &'static str) -> u64 {
    if value == u64::MAX {
        warn!(counter, "Counter saturated at u64::MAX");
    }
    value.saturating_add(1)
}
