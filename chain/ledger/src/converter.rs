//! Native → USD-equivalent conversion
//!
//! `usd = native * price / DECIMAL_FACTOR`, where the factor aligns the native
//! unit's 18 decimals and the oracle's 8 decimals onto the stable unit's 6.
//! Division floors. Fractional remainders are dropped, never rounded up and
//! never carried into a later conversion.

use rust_decimal::Decimal;
use types::denomination::{Denomination, NATIVE_DECIMALS, STABLE_DECIMALS};
use types::numeric;

use crate::errors::LedgerError;
use crate::oracle::ORACLE_DECIMALS;

/// `10^(NATIVE_DECIMALS + ORACLE_DECIMALS - STABLE_DECIMALS)` = 10^20.
pub const DECIMAL_FACTOR: u128 = 100_000_000_000_000_000_000;

const _: () = assert!(NATIVE_DECIMALS + ORACLE_DECIMALS - STABLE_DECIMALS == 20);

/// Convert a native amount to USD-equivalent at `price`.
pub fn to_usd_equivalent(native_amount: u128, price: u128) -> Result<u128, LedgerError> {
    let scaled = native_amount
        .checked_mul(price)
        .ok_or(LedgerError::Overflow)?;
    Ok(scaled / DECIMAL_FACTOR)
}

/// USD-equivalent of `amount` in any denomination. Stable is the identity.
pub fn usd_value_of(
    denomination: Denomination,
    amount: u128,
    price: u128,
) -> Result<u128, LedgerError> {
    if denomination.needs_conversion() {
        to_usd_equivalent(amount, price)
    } else {
        Ok(amount)
    }
}

/// Human-readable rendering for logs and state views.
///
/// Falls back to `Decimal::MAX` for amounts beyond what `Decimal` can hold.
pub fn to_display(amount: u128, denomination: Denomination) -> Decimal {
    numeric::to_decimal(amount, denomination).unwrap_or(Decimal::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// $2,000.00000000 per native unit
    const PRICE_2000: u128 = 2_000_00000000;
    const ONE_NATIVE: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_one_native_at_2000() {
        assert_eq!(
            to_usd_equivalent(ONE_NATIVE, PRICE_2000).unwrap(),
            2_000_000_000
        );
    }

    #[test]
    fn test_conversion_floors() {
        // 1 wei at $2000 is 2e-15 USD, far below one stable unit.
        assert_eq!(to_usd_equivalent(1, PRICE_2000).unwrap(), 0);
        // 0.0000015 USD worth floors to 1 micro-dollar.
        assert_eq!(to_usd_equivalent(750_000_000, PRICE_2000).unwrap(), 1);
        assert_eq!(to_usd_equivalent(999_999_999, PRICE_2000).unwrap(), 1);
    }

    #[test]
    fn test_conversion_overflow_is_error() {
        assert_eq!(to_usd_equivalent(u128::MAX, 2), Err(LedgerError::Overflow));
    }

    #[test]
    fn test_stable_is_identity() {
        assert_eq!(usd_value_of(Denomination::Stable, 42, PRICE_2000).unwrap(), 42);
        assert_eq!(usd_value_of(Denomination::Stable, u128::MAX, PRICE_2000).unwrap(), u128::MAX);
    }

    #[test]
    fn test_native_goes_through_price() {
        assert_eq!(
            usd_value_of(Denomination::Native, ONE_NATIVE, PRICE_2000).unwrap(),
            2_000_000_000
        );
        assert_eq!(
            usd_value_of(Denomination::Native, u128::MAX, PRICE_2000),
            Err(LedgerError::Overflow)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            to_display(2_500_000, Denomination::Stable),
            Decimal::from_str_exact("2.5").unwrap()
        );
        assert_eq!(to_display(u128::MAX, Denomination::Native), Decimal::MAX);
    }
}
