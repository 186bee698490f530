//! Ledger configuration
//!
//! Three values fixed at creation. All USD-equivalent figures are in stable
//! smallest units (6 decimals); the minimum deposit is in native smallest
//! units (18 decimals).

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::LedgerError;

/// Immutable limits applied by the policy validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Ceiling on the aggregate USD-equivalent total.
    pub global_cap: u128,
    /// Ceiling on the USD-equivalent of any single withdrawal.
    pub withdrawal_threshold: u128,
    /// Floor on a native deposit, in native smallest units.
    pub minimum_deposit: u128,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            // $1,000,000
            global_cap: 1_000_000_000_000,
            // $10,000
            withdrawal_threshold: 10_000_000_000,
            // 0.001 native
            minimum_deposit: 1_000_000_000_000_000,
        }
    }
}

impl LedgerConfig {
    /// Build and validate a configuration.
    pub fn new(
        global_cap: u128,
        withdrawal_threshold: u128,
        minimum_deposit: u128,
    ) -> Result<Self, LedgerError> {
        let config = Self {
            global_cap,
            withdrawal_threshold,
            minimum_deposit,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check `0 < withdrawal_threshold <= global_cap`.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.withdrawal_threshold == 0 {
            return Err(LedgerError::InvalidConfig {
                reason: "withdrawal_threshold must be positive".to_string(),
            });
        }
        if self.withdrawal_threshold > self.global_cap {
            return Err(LedgerError::InvalidConfig {
                reason: format!(
                    "withdrawal_threshold {} exceeds global_cap {}",
                    self.withdrawal_threshold, self.global_cap
                ),
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, LedgerError> {
        let config: Self = serde_json::from_str(json).map_err(|e| LedgerError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        info!(
            global_cap = %config.global_cap,
            withdrawal_threshold = %config.withdrawal_threshold,
            minimum_deposit = %config.minimum_deposit,
            "Ledger configuration loaded"
        );
        Ok(config)
    }
}
