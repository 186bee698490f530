//! Denominations held by the ledger
//!
//! Exactly two units are custodied: the platform's native coin and a single
//! stable reference unit pegged 1:1 to the USD-equivalent accounting unit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal precision of the native unit (smallest unit = 10^-18).
pub const NATIVE_DECIMALS: u32 = 18;

/// Decimal precision of the stable unit, which is also the precision of every
/// USD-equivalent figure (aggregate total, cap, threshold).
pub const STABLE_DECIMALS: u32 = 6;

/// A custodied unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Denomination {
    /// The chain's base coin, converted to USD-equivalent through the oracle
    Native,
    /// The stable reference unit, USD-equivalent by definition
    Stable,
}

impl Denomination {
    /// All denominations, in storage order.
    pub const ALL: [Denomination; 2] = [Denomination::Native, Denomination::Stable];

    /// Decimal places of the smallest unit.
    pub fn decimals(&self) -> u32 {
        match self {
            Denomination::Native => NATIVE_DECIMALS,
            Denomination::Stable => STABLE_DECIMALS,
        }
    }

    /// Ticker used in logs and reports.
    pub fn symbol(&self) -> &'static str {
        match self {
            Denomination::Native => "NATIVE",
            Denomination::Stable => "USD",
        }
    }

    /// Whether amounts in this unit need the oracle to become USD-equivalent.
    pub fn needs_conversion(&self) -> bool {
        matches!(self, Denomination::Native)
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimals() {
        assert_eq!(Denomination::Native.decimals(), 18);
        assert_eq!(Denomination::Stable.decimals(), 6);
    }

    #[test]
    fn test_only_native_needs_conversion() {
        assert!(Denomination::Native.needs_conversion());
        assert!(!Denomination::Stable.needs_conversion());
    }

    #[test]
    fn test_serialization_format() {
        let json = serde_json::to_string(&Denomination::Stable).unwrap();
        assert_eq!(json, "\"STABLE\"");
        let back: Denomination = serde_json::from_str("\"NATIVE\"").unwrap();
        assert_eq!(back, Denomination::Native);
    }
}
