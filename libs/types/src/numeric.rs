//! Integer amounts and their decimal presentation
//!
//! Ledger arithmetic is done on `u128` smallest-unit integers so that the
//! floor-truncating conversion is exact and reproducible. `rust_decimal` is
//! only used at the edge, to render amounts for humans.

use rust_decimal::Decimal;

use crate::denomination::Denomination;

/// An amount in a denomination's smallest unit.
pub type Amount = u128;

/// `10^exp` as an amount, or `None` if it does not fit.
pub fn pow10(exp: u32) -> Option<Amount> {
    10u128.checked_pow(exp)
}

/// Scale a whole-unit count into smallest units (e.g. 3 native → 3·10^18).
pub fn whole_units(count: u128, denomination: Denomination) -> Option<Amount> {
    pow10(denomination.decimals())?.checked_mul(count)
}

/// Render a smallest-unit amount as a decimal in whole units.
///
/// Returns `None` when the amount exceeds the 96-bit mantissa `Decimal` can
/// represent.
pub fn to_decimal(amount: Amount, denomination: Denomination) -> Option<Decimal> {
    let mantissa = i128::try_from(amount).ok()?;
    Decimal::try_from_i128_with_scale(mantissa, denomination.decimals()).ok()
}
