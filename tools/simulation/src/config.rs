//! Simulation configuration

use ledger::LedgerConfig;
use serde::{Deserialize, Serialize};
use types::denomination::Denomination;
use types::numeric::whole_units;

/// Parameters for a seeded simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// RNG seed; the same seed replays the same run
    pub seed: u64,
    /// Operations generated by a random flow
    pub steps: usize,
    /// Number of holders
    pub holders: usize,
    /// Opening oracle price, 8 decimals
    pub initial_price: i128,
    /// Unix seconds at step zero
    pub start_time: i64,
    /// Clock advance per step
    pub step_secs: i64,
    /// Native smallest units each holder starts with outside custody
    pub wallet_native: u128,
    /// Stable smallest units each holder starts with and authorizes
    pub wallet_stable: u128,
    pub ledger: LedgerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            steps: 500,
            holders: 5,
            initial_price: 2_000_00000000,
            start_time: 1_700_000_000,
            step_secs: 12,
            wallet_native: whole_units(1_000, Denomination::Native).unwrap_or(u128::MAX),
            wallet_stable: whole_units(1_000_000, Denomination::Stable).unwrap_or(u128::MAX),
            ledger: LedgerConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimConfig::from_json_str(r#"{ "seed": 7, "steps": 10 }"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.steps, 10);
        assert_eq!(config.holders, SimConfig::default().holders);
        assert_eq!(config.ledger, LedgerConfig::default());
    }

    #[test]
    fn test_default_wallets_in_whole_units() {
        let config = SimConfig::default();
        // 1,000 native and $1,000,000 stable.
        assert_eq!(config.wallet_native, 1_000_000_000_000_000_000_000);
        assert_eq!(config.wallet_stable, 1_000_000_000_000);
    }
}
