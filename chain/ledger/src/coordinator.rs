//! Transfer coordinator: the ledger's transactional entry points
//!
//! Every transfer-class operation runs the same sequence:
//!
//! 1. `Validating`: pause check, execution lock, oracle read, policy check
//! 2. `Committed`: balance, counters, aggregate and event written
//! 3. `Transferring`: external value movement through a `ValueTransport`
//! 4. `Done`: lock released
//!
//! Any failure ends in `Rejected` with no surviving mutation. State is
//! committed before the transport runs, so a transport that calls back into
//! the ledger observes the already-debited balance; the execution lock then
//! refuses the nested operation outright. A transport failure restores the
//! checkpoint taken just before commit.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use types::denomination::Denomination;
use types::ids::{FeedId, HolderId, OperationId};

use crate::config::LedgerConfig;
use crate::converter;
use crate::errors::{LedgerError, TransportError};
use crate::events::{
    AdministrationTransferred, DepositSucceeded, LedgerEvent, PriceSourceUpdated,
    WithdrawalSucceeded,
};
use crate::oracle::{OracleGateway, PriceFeed};
use crate::policy;
use crate::security::{AccessControl, AccessGate, ExecutionLock, PauseGuard, Role};
use crate::store::{Checkpoint, LedgerStore};

/// Phase of a single operation, traced at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Validating,
    Committed,
    Transferring,
    Done,
    Rejected,
}

/// External value movement.
///
/// Implementations receive the ledger mutably so they can call back into it,
/// which is how adversarial reentrancy is modelled.
pub trait ValueTransport {
    /// Pay `amount` of `denomination` out of custody to `to`.
    fn send(
        &mut self,
        ledger: &mut Ledger,
        to: HolderId,
        denomination: Denomination,
        amount: u128,
    ) -> Result<(), TransportError>;

    /// Stable units `from` has authorized the ledger to pull.
    fn allowance(&self, from: &HolderId) -> u128;

    /// Pull previously authorized stable units from `from` into custody.
    fn pull(&mut self, ledger: &mut Ledger, from: HolderId, amount: u128)
        -> Result<(), TransportError>;
}

/// A typed inbound call. Value arriving without a recognised selector has no
/// accepting path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundCall {
    DepositNative { amount: u128 },
    DepositStable { amount: u128 },
    WithdrawNative { amount: u128 },
    WithdrawStable { amount: u128 },
    /// Plain value transfer with no call data.
    Bare { value: u128 },
    /// Call data that matches no entry point.
    Unknown { selector: [u8; 4], value: u128 },
}

/// Read-only view of the ledger's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub paused: bool,
    pub aggregate_total: u128,
    pub aggregate_display: Decimal,
    pub global_cap: u128,
    pub withdrawal_threshold: u128,
    pub price_source: FeedId,
    pub deposit_count: u64,
    pub withdrawal_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Deposit,
    Withdrawal,
}

/// A committed but not yet settled operation.
struct PendingCommit {
    checkpoint: Checkpoint,
    events_len: usize,
    event: LedgerEvent,
}

/// The custodial ledger.
///
/// Owns the store and aggregate exclusively; exposes read accessors and the
/// transactional entry points only.
pub struct Ledger {
    pub(crate) config: LedgerConfig,
    pub(crate) store: LedgerStore,
    pub(crate) oracle: OracleGateway,
    pub(crate) access: Box<dyn AccessGate>,
    pub(crate) pause_guard: PauseGuard,
    lock: ExecutionLock,
    events: Vec<LedgerEvent>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field("aggregate_total", &self.store.aggregate_total())
            .field("price_source", &self.oracle.source_id())
            .field("paused", &self.pause_guard.is_paused())
            .field("in_flight", &self.lock.held_by())
            .finish()
    }
}

impl Ledger {
    /// Create a zeroed ledger.
    pub fn new(
        config: LedgerConfig,
        price_feed: Box<dyn PriceFeed>,
        access: Box<dyn AccessGate>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        let oracle = OracleGateway::new(price_feed);
        info!(
            global_cap = %config.global_cap,
            withdrawal_threshold = %config.withdrawal_threshold,
            minimum_deposit = %config.minimum_deposit,
            price_source = %oracle.source_id(),
            owner = %access.owner(),
            "Ledger created"
        );
        Ok(Self::from_parts(
            config,
            LedgerStore::new(),
            oracle,
            access,
            PauseGuard::new(),
        ))
    }

    /// Create a ledger administered by a fresh `AccessControl` owned by `owner`.
    pub fn with_owner(
        config: LedgerConfig,
        price_feed: Box<dyn PriceFeed>,
        owner: HolderId,
    ) -> Result<Self, LedgerError> {
        Self::new(config, price_feed, Box::new(AccessControl::new(owner)))
    }

    pub(crate) fn from_parts(
        config: LedgerConfig,
        store: LedgerStore,
        oracle: OracleGateway,
        access: Box<dyn AccessGate>,
        pause_guard: PauseGuard,
    ) -> Self {
        Self {
            config,
            store,
            oracle,
            access,
            pause_guard,
            lock: ExecutionLock::new(),
            events: Vec::new(),
        }
    }

    // ───────────────────────── Deposits ─────────────────────────

    /// Credit native value that arrived with the call.
    pub fn deposit_native(
        &mut self,
        caller: HolderId,
        amount: u128,
        now: i64,
    ) -> Result<LedgerEvent, LedgerError> {
        self.locked("deposit_native", |ledger| {
            let price = ledger.oracle.fetch_price(now)?;
            let usd_value = policy::validate_native_deposit(
                &ledger.config,
                &ledger.store,
                caller,
                amount,
                price.price,
            )?;
            let pending = ledger.commit(
                Direction::Deposit,
                Denomination::Native,
                caller,
                amount,
                usd_value,
            )?;
            // Value already arrived with the call; nothing to transfer.
            Ok(pending.event)
        })
    }

    /// Credit stable units, pulling them through the caller's authorization.
    pub fn deposit_stable(
        &mut self,
        caller: HolderId,
        amount: u128,
        transport: &mut dyn ValueTransport,
    ) -> Result<LedgerEvent, LedgerError> {
        self.locked("deposit_stable", |ledger| {
            let usd_value =
                policy::validate_stable_deposit(&ledger.config, &ledger.store, caller, amount)?;

            let allowance = transport.allowance(&caller);
            if allowance < amount {
                return Err(LedgerError::AuthorizationInsufficient {
                    holder: caller,
                    required: amount,
                    allowance,
                });
            }

            let pending = ledger.commit(
                Direction::Deposit,
                Denomination::Stable,
                caller,
                amount,
                usd_value,
            )?;
            trace_phase("deposit_stable", OperationPhase::Transferring);
            let outcome = transport.pull(ledger, caller, amount);
            ledger.settle(pending, outcome, caller)
        })
    }

    // ───────────────────────── Withdrawals ─────────────────────────

    /// Debit native value and pay it out.
    pub fn withdraw_native(
        &mut self,
        caller: HolderId,
        amount: u128,
        now: i64,
        transport: &mut dyn ValueTransport,
    ) -> Result<LedgerEvent, LedgerError> {
        self.locked("withdraw_native", |ledger| {
            let price = ledger.oracle.fetch_price(now)?;
            let usd_value = policy::validate_native_withdrawal(
                &ledger.config,
                &ledger.store,
                caller,
                amount,
                price.price,
            )?;
            let pending = ledger.commit(
                Direction::Withdrawal,
                Denomination::Native,
                caller,
                amount,
                usd_value,
            )?;
            trace_phase("withdraw_native", OperationPhase::Transferring);
            let outcome = transport.send(ledger, caller, Denomination::Native, amount);
            ledger.settle(pending, outcome, caller)
        })
    }

    /// Debit stable units and pay them out.
    pub fn withdraw_stable(
        &mut self,
        caller: HolderId,
        amount: u128,
        transport: &mut dyn ValueTransport,
    ) -> Result<LedgerEvent, LedgerError> {
        self.locked("withdraw_stable", |ledger| {
            let usd_value = policy::validate_stable_withdrawal(
                &ledger.config,
                &ledger.store,
                caller,
                amount,
            )?;
            let pending = ledger.commit(
                Direction::Withdrawal,
                Denomination::Stable,
                caller,
                amount,
                usd_value,
            )?;
            trace_phase("withdraw_stable", OperationPhase::Transferring);
            let outcome = transport.send(ledger, caller, Denomination::Stable, amount);
            ledger.settle(pending, outcome, caller)
        })
    }

    /// Route a typed inbound call to its entry point.
    pub fn dispatch(
        &mut self,
        caller: HolderId,
        call: InboundCall,
        now: i64,
        transport: &mut dyn ValueTransport,
    ) -> Result<LedgerEvent, LedgerError> {
        match call {
            InboundCall::DepositNative { amount } => self.deposit_native(caller, amount, now),
            InboundCall::DepositStable { amount } => self.deposit_stable(caller, amount, transport),
            InboundCall::WithdrawNative { amount } => {
                self.withdraw_native(caller, amount, now, transport)
            }
            InboundCall::WithdrawStable { amount } => {
                self.withdraw_stable(caller, amount, transport)
            }
            InboundCall::Bare { value } => {
                warn!(caller = %caller, value = %value, "Rejected bare value transfer");
                Err(LedgerError::NonPermittedOperation {
                    reason: "value sent without a deposit call".to_string(),
                })
            }
            InboundCall::Unknown { selector, value } => {
                warn!(
                    caller = %caller,
                    selector = ?selector,
                    value = %value,
                    "Rejected call with unknown selector"
                );
                Err(LedgerError::NonPermittedAccess { caller })
            }
        }
    }

    /// Run the validation a call would face, without the lock or any mutation.
    ///
    /// Returns the USD-equivalent value the call would commit. Safe to use from
    /// inside a transport callback.
    pub fn preview(
        &self,
        caller: HolderId,
        call: &InboundCall,
        now: i64,
    ) -> Result<u128, LedgerError> {
        self.check_not_paused()?;
        match *call {
            InboundCall::DepositNative { amount } => {
                let price = self.oracle.fetch_price(now)?;
                policy::validate_native_deposit(&self.config, &self.store, caller, amount, price.price)
            }
            InboundCall::DepositStable { amount } => {
                policy::validate_stable_deposit(&self.config, &self.store, caller, amount)
            }
            InboundCall::WithdrawNative { amount } => {
                let price = self.oracle.fetch_price(now)?;
                policy::validate_native_withdrawal(
                    &self.config,
                    &self.store,
                    caller,
                    amount,
                    price.price,
                )
            }
            InboundCall::WithdrawStable { amount } => {
                policy::validate_stable_withdrawal(&self.config, &self.store, caller, amount)
            }
            InboundCall::Bare { .. } => Err(LedgerError::NonPermittedOperation {
                reason: "value sent without a deposit call".to_string(),
            }),
            InboundCall::Unknown { .. } => Err(LedgerError::NonPermittedAccess { caller }),
        }
    }

    // ───────────────────────── Queries ─────────────────────────

    /// USD-equivalent of both of `holder`'s balances, native at the live price.
    pub fn query_balance(&self, holder: &HolderId, now: i64) -> Result<u128, LedgerError> {
        let price = self.oracle.fetch_price(now)?;
        Denomination::ALL.iter().try_fold(0u128, |total, &denomination| {
            let value = converter::usd_value_of(
                denomination,
                self.store.get(denomination, holder),
                price.price,
            )?;
            total.checked_add(value).ok_or(LedgerError::Overflow)
        })
    }

    /// Raw balance in one denomination.
    pub fn query_denomination_balance(&self, holder: &HolderId, denomination: Denomination) -> u128 {
        self.store.get(denomination, holder)
    }

    /// Flags, totals and limits.
    pub fn query_state(&self) -> LedgerState {
        let aggregate_total = self.store.aggregate_total();
        LedgerState {
            paused: self.pause_guard.is_paused(),
            aggregate_total,
            aggregate_display: converter::to_display(aggregate_total, Denomination::Stable),
            global_cap: self.config.global_cap,
            withdrawal_threshold: self.config.withdrawal_threshold,
            price_source: self.oracle.source_id(),
            deposit_count: self.store.deposit_count(),
            withdrawal_count: self.store.withdrawal_count(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Read access to the balance table.
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn is_paused(&self) -> bool {
        self.pause_guard.is_paused()
    }

    /// Whether a transfer operation is in flight.
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn owner(&self) -> HolderId {
        self.access.owner()
    }

    pub fn has_role(&self, account: &HolderId, role: Role) -> bool {
        self.access.has_role(account, role)
    }

    // ───────────────────────── Administration ─────────────────────────

    /// Stop all deposits and withdrawals. Owner or `Pauser`.
    pub fn pause(&mut self, caller: HolderId) -> Result<LedgerEvent, LedgerError> {
        self.require(caller, Role::Pauser)?;
        if !self.pause_guard.pause() {
            return Err(LedgerError::NonPermittedOperation {
                reason: "ledger already paused".to_string(),
            });
        }
        info!(by = %caller, "Ledger paused");
        Ok(self.emit(LedgerEvent::Paused { by: caller }))
    }

    /// Resume deposits and withdrawals. Owner or `Pauser`.
    pub fn unpause(&mut self, caller: HolderId) -> Result<LedgerEvent, LedgerError> {
        self.require(caller, Role::Pauser)?;
        if !self.pause_guard.unpause() {
            return Err(LedgerError::NonPermittedOperation {
                reason: "ledger not paused".to_string(),
            });
        }
        info!(by = %caller, "Ledger unpaused");
        Ok(self.emit(LedgerEvent::Unpaused { by: caller }))
    }

    /// Replace the price source. Owner or `OracleManager`, only while paused,
    /// and only with a source that currently reports a fresh positive price.
    pub fn set_price_source(
        &mut self,
        caller: HolderId,
        feed: Box<dyn PriceFeed>,
        now: i64,
    ) -> Result<LedgerEvent, LedgerError> {
        self.require(caller, Role::OracleManager)?;
        self.require_paused()?;

        let current = feed.id();
        let previous = self.oracle.replace_source(feed, now).map_err(|e| {
            warn!(candidate = %current, error = %e, "Price source replacement rejected");
            LedgerError::from(e)
        })?;

        info!(previous = %previous, current = %current, by = %caller, "Price source updated");
        Ok(self.emit(LedgerEvent::PriceSourceUpdated(PriceSourceUpdated {
            previous,
            current,
            updated_by: caller,
        })))
    }

    /// Hand ownership to `new_owner`. Owner only, only while paused.
    ///
    /// Roles held by the previous owner are revoked.
    pub fn transfer_administration(
        &mut self,
        caller: HolderId,
        new_owner: HolderId,
    ) -> Result<LedgerEvent, LedgerError> {
        self.ensure_idle()?;
        if !self.access.is_owner(&caller) {
            return Err(LedgerError::NonPermittedAccess { caller });
        }
        self.require_paused()?;
        if new_owner == caller {
            return Err(LedgerError::NonPermittedOperation {
                reason: "new owner is the current owner".to_string(),
            });
        }

        for role in [Role::Admin, Role::Pauser, Role::OracleManager] {
            self.access.revoke(&caller, role);
        }
        self.access.set_owner(new_owner);

        info!(previous = %caller, new_owner = %new_owner, "Administration transferred");
        Ok(self.emit(LedgerEvent::AdministrationTransferred(
            AdministrationTransferred {
                previous_owner: caller,
                new_owner,
            },
        )))
    }

    /// Assign `role` to `account`. Owner or `Admin`. Returns `false` and emits
    /// nothing if the role was already held.
    pub fn grant_role(
        &mut self,
        caller: HolderId,
        account: HolderId,
        role: Role,
    ) -> Result<bool, LedgerError> {
        self.require(caller, Role::Admin)?;
        if !self.access.grant(account, role) {
            return Ok(false);
        }
        info!(role = ?role, account = %account, by = %caller, "Role granted");
        self.emit(LedgerEvent::RoleGranted {
            role,
            account,
            by: caller,
        });
        Ok(true)
    }

    /// Remove `role` from `account`. Owner or `Admin`. Returns `false` and
    /// emits nothing if the role was not held.
    pub fn revoke_role(
        &mut self,
        caller: HolderId,
        account: HolderId,
        role: Role,
    ) -> Result<bool, LedgerError> {
        self.require(caller, Role::Admin)?;
        if !self.access.revoke(&account, role) {
            return Ok(false);
        }
        info!(role = ?role, account = %account, by = %caller, "Role revoked");
        self.emit(LedgerEvent::RoleRevoked {
            role,
            account,
            by: caller,
        });
        Ok(true)
    }

    // ───────────────────────── Events ─────────────────────────

    /// All emitted events.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    ///
    /// Returns nothing while a transfer is in flight: the pending event may
    /// still be rolled back.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        if self.lock.is_locked() {
            debug!("Event drain deferred while a transfer is in flight");
            return Vec::new();
        }
        std::mem::take(&mut self.events)
    }

    // ───────────────────────── Internal ─────────────────────────

    /// Run `body` under the execution lock. The lock is released on every
    /// exit path here and nowhere else.
    fn locked<T>(
        &mut self,
        operation: &'static str,
        body: impl FnOnce(&mut Self) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        self.check_not_paused()?;
        self.lock.acquire(operation)?;
        trace_phase(operation, OperationPhase::Validating);

        let result = body(self);
        self.lock.release();

        match &result {
            Ok(_) => trace_phase(operation, OperationPhase::Done),
            Err(e) => {
                if e.is_validation() {
                    debug!(operation, error = %e, "Operation rejected by policy");
                } else {
                    warn!(operation, error = %e, "Operation rejected");
                }
                trace_phase(operation, OperationPhase::Rejected);
            }
        }
        result
    }

    /// Apply the ledger mutation and record the event. Either everything is
    /// written or nothing is.
    fn commit(
        &mut self,
        direction: Direction,
        denomination: Denomination,
        holder: HolderId,
        amount: u128,
        usd_value: u128,
    ) -> Result<PendingCommit, LedgerError> {
        let checkpoint = self.store.checkpoint(denomination, holder);
        let events_len = self.events.len();

        if let Err(e) = self.apply(direction, denomination, holder, amount, usd_value) {
            self.store.rollback(checkpoint);
            return Err(e);
        }

        let operation_id = OperationId::new();
        let event = match direction {
            Direction::Deposit => LedgerEvent::DepositSucceeded(DepositSucceeded {
                operation_id,
                holder,
                denomination,
                amount,
                usd_value,
            }),
            Direction::Withdrawal => LedgerEvent::WithdrawalSucceeded(WithdrawalSucceeded {
                operation_id,
                holder,
                denomination,
                amount,
                usd_value,
            }),
        };
        self.events.push(event.clone());

        info!(
            operation_id = %operation_id,
            holder = %holder,
            denomination = %denomination,
            amount = %converter::to_display(amount, denomination),
            usd_value = %converter::to_display(usd_value, Denomination::Stable),
            aggregate_total = %self.store.aggregate_total(),
            event = event.label(),
            "Ledger committed"
        );
        trace_phase(event.label(), OperationPhase::Committed);

        Ok(PendingCommit {
            checkpoint,
            events_len,
            event,
        })
    }

    fn apply(
        &mut self,
        direction: Direction,
        denomination: Denomination,
        holder: HolderId,
        amount: u128,
        usd_value: u128,
    ) -> Result<(), LedgerError> {
        match direction {
            Direction::Deposit => {
                self.store.credit(denomination, holder, amount)?;
                self.store.add_to_aggregate(usd_value)?;
                self.store.increment_deposits();
            }
            Direction::Withdrawal => {
                self.store.debit(denomination, holder, amount)?;
                self.store.remove_from_aggregate(usd_value);
                self.store.increment_withdrawals();
            }
        }
        Ok(())
    }

    /// Finish the `Transferring` phase: keep the commit, or undo it.
    fn settle(
        &mut self,
        pending: PendingCommit,
        outcome: Result<(), TransportError>,
        holder: HolderId,
    ) -> Result<LedgerEvent, LedgerError> {
        match outcome {
            Ok(()) => Ok(pending.event),
            Err(e) => {
                self.store.rollback(pending.checkpoint);
                self.events.truncate(pending.events_len);
                warn!(holder = %holder, reason = %e.reason, "Transfer failed; commit rolled back");
                Err(LedgerError::TransferRejected {
                    holder,
                    reason: e.reason,
                })
            }
        }
    }

    fn emit(&mut self, event: LedgerEvent) -> LedgerEvent {
        self.events.push(event.clone());
        event
    }

    /// Caller must be owner or hold `role`, and no transfer may be in flight.
    fn require(&self, caller: HolderId, role: Role) -> Result<(), LedgerError> {
        self.ensure_idle()?;
        if !self.access.is_authorized(&caller, role) {
            warn!(caller = %caller, role = ?role, "Unauthorized administrative call");
            return Err(LedgerError::NonPermittedAccess { caller });
        }
        Ok(())
    }

    /// Administrative mutations are refused while a transfer is in flight so
    /// that a rollback never has to undo them.
    pub(crate) fn ensure_idle(&self) -> Result<(), LedgerError> {
        if self.lock.is_locked() {
            return Err(LedgerError::ReentrantCall);
        }
        Ok(())
    }

    fn require_paused(&self) -> Result<(), LedgerError> {
        if !self.pause_guard.is_paused() {
            return Err(LedgerError::NotPaused);
        }
        Ok(())
    }

    fn check_not_paused(&self) -> Result<(), LedgerError> {
        if self.pause_guard.is_paused() {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }
}

fn trace_phase(operation: &'static str, phase: OperationPhase) {
    debug!(operation, phase = ?phase, "Phase transition");
}
