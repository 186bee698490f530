//! Simulation metrics
//!
//! Tracks accepted and rejected operations, rejection reasons, value moved and
//! the peak aggregate.

use std::collections::BTreeMap;

use ledger::converter::to_display;
use ledger::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::denomination::Denomination;

/// Aggregated simulation metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimMetrics {
    pub operations: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Rejection count keyed by error code
    pub rejections: BTreeMap<String, u64>,
    pub deposits: u64,
    pub withdrawals: u64,
    /// USD-equivalent committed by deposits, stable smallest units
    pub deposited_usd: u128,
    /// USD-equivalent committed by withdrawals, stable smallest units
    pub withdrawn_usd: u128,
    pub peak_aggregate: u128,
    pub reprices: u64,
}

impl SimMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&mut self, usd_value: u128) {
        self.operations += 1;
        self.accepted += 1;
        self.deposits += 1;
        self.deposited_usd = self.deposited_usd.saturating_add(usd_value);
    }

    pub fn record_withdrawal(&mut self, usd_value: u128) {
        self.operations += 1;
        self.accepted += 1;
        self.withdrawals += 1;
        self.withdrawn_usd = self.withdrawn_usd.saturating_add(usd_value);
    }

    pub fn record_rejection(&mut self, error: &LedgerError) {
        self.operations += 1;
        self.rejected += 1;
        *self.rejections.entry(error.code().to_string()).or_insert(0) += 1;
    }

    pub fn record_reprice(&mut self) {
        self.reprices += 1;
    }

    /// Update peak aggregate.
    pub fn observe_aggregate(&mut self, aggregate: u128) {
        self.peak_aggregate = self.peak_aggregate.max(aggregate);
    }

    /// Rejections with the given code.
    pub fn rejections_of(&self, code: &str) -> u64 {
        self.rejections.get(code).copied().unwrap_or(0)
    }

    /// Share of operations accepted, 0..=1.
    pub fn acceptance_rate(&self) -> Decimal {
        if self.operations == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.accepted) / Decimal::from(self.operations)).round_dp(4)
    }

    /// Peak aggregate in whole USD.
    pub fn peak_aggregate_usd(&self) -> Decimal {
        to_display(self.peak_aggregate, Denomination::Stable)
    }
}
