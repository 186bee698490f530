//! Policy validators
//!
//! Four independent, side-effect-free checks run before any ledger mutation.
//! Each returns the USD-equivalent value of the proposed operation so the
//! coordinator commits exactly the figure that was validated.
//!
//! The withdrawal threshold applies to withdrawals only. Deposits are bounded
//! by the global cap alone.

use types::denomination::Denomination;
use types::ids::HolderId;

use crate::config::LedgerConfig;
use crate::converter;
use crate::errors::LedgerError;
use crate::store::LedgerStore;

/// Native deposit: minimum, non-zero value, then cap.
pub fn validate_native_deposit(
    config: &LedgerConfig,
    store: &LedgerStore,
    holder: HolderId,
    amount: u128,
    price: u128,
) -> Result<u128, LedgerError> {
    if amount < config.minimum_deposit {
        return Err(LedgerError::BelowMinimum {
            holder,
            amount,
            minimum: config.minimum_deposit,
        });
    }

    let usd_value = converter::to_usd_equivalent(amount, price)?;
    if usd_value == 0 {
        return Err(LedgerError::ZeroAmount { holder });
    }

    check_cap(config, store, holder, usd_value)?;
    Ok(usd_value)
}

/// Stable deposit: non-zero, then cap. Stable is USD-equivalent 1:1.
pub fn validate_stable_deposit(
    config: &LedgerConfig,
    store: &LedgerStore,
    holder: HolderId,
    amount: u128,
) -> Result<u128, LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount { holder });
    }
    check_cap(config, store, holder, amount)?;
    Ok(amount)
}

/// Native withdrawal: non-zero, threshold, then balance.
pub fn validate_native_withdrawal(
    config: &LedgerConfig,
    store: &LedgerStore,
    holder: HolderId,
    amount: u128,
    price: u128,
) -> Result<u128, LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount { holder });
    }

    let usd_value = converter::to_usd_equivalent(amount, price)?;
    check_threshold(config, holder, usd_value)?;
    check_balance(store, Denomination::Native, holder, amount)?;
    Ok(usd_value)
}

/// Stable withdrawal: non-zero, threshold, then balance.
pub fn validate_stable_withdrawal(
    config: &LedgerConfig,
    store: &LedgerStore,
    holder: HolderId,
    amount: u128,
) -> Result<u128, LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount { holder });
    }
    check_threshold(config, holder, amount)?;
    check_balance(store, Denomination::Stable, holder, amount)?;
    Ok(amount)
}

fn check_cap(
    config: &LedgerConfig,
    store: &LedgerStore,
    holder: HolderId,
    usd_value: u128,
) -> Result<(), LedgerError> {
    let aggregate = store.aggregate_total();
    let within_cap = aggregate
        .checked_add(usd_value)
        .map_or(false, |total| total <= config.global_cap);
    if !within_cap {
        return Err(LedgerError::CapExceeded {
            holder,
            usd_value,
            aggregate,
            cap: config.global_cap,
        });
    }
    Ok(())
}

fn check_threshold(
    config: &LedgerConfig,
    holder: HolderId,
    usd_value: u128,
) -> Result<(), LedgerError> {
    if usd_value > config.withdrawal_threshold {
        return Err(LedgerError::ThresholdExceeded {
            holder,
            usd_value,
            threshold: config.withdrawal_threshold,
        });
    }
    Ok(())
}

fn check_balance(
    store: &LedgerStore,
    denomination: Denomination,
    holder: HolderId,
    amount: u128,
) -> Result<(), LedgerError> {
    let available = store.get(denomination, &holder);
    if amount > available {
        return Err(LedgerError::InsufficientFunds {
            holder,
            denomination,
            requested: amount,
            available,
        });
    }
    Ok(())
}
