//! Reentrancy drain scenario
//!
//! Every payout goes through a transport that calls back into the ledger and
//! asks for the same withdrawal again before releasing any value. Custody must
//! pay each committed withdrawal exactly once and every nested attempt must be
//! refused by the execution lock.

use ledger::errors::{LedgerError, TransportError};
use ledger::{InMemoryTransport, Ledger, ValueTransport};
use tracing::{info, warn};
use types::denomination::Denomination;
use types::ids::HolderId;

use crate::config::SimConfig;
use crate::engine::{SimLedger, SimOp, StepOutcome};
use crate::scenarios::{setup_failed, ScenarioResult};

const NAME: &str = "reentrancy_drain";

/// Withdrawal rounds per holder and denomination.
const ROUNDS: usize = 3;

/// Transport that re-enters the ledger on every payout.
#[derive(Debug, Default)]
pub struct DrainingTransport {
    pub inner: InMemoryTransport,
    pub now: i64,
    pub attempts: u64,
    pub refused: u64,
    /// Nested calls that were accepted. Must stay zero.
    pub leaked: u64,
    /// Nested calls refused for any reason other than the lock.
    pub other_errors: u64,
}

impl DrainingTransport {
    pub fn new(inner: InMemoryTransport, now: i64) -> Self {
        Self {
            inner,
            now,
            ..Default::default()
        }
    }

    fn strike(&mut self, ledger: &mut Ledger, holder: HolderId, denomination: Denomination, amount: u128) {
        self.attempts += 1;
        let nested = match denomination {
            Denomination::Native => ledger.withdraw_native(holder, amount, self.now, &mut self.inner),
            Denomination::Stable => ledger.withdraw_stable(holder, amount, &mut self.inner),
        };
        match nested {
            Err(LedgerError::ReentrantCall) => self.refused += 1,
            Ok(event) => {
                warn!(holder = %holder, event = event.label(), "Nested withdrawal accepted");
                self.leaked += 1;
            }
            Err(_) => self.other_errors += 1,
        }
    }
}

impl ValueTransport for DrainingTransport {
    fn send(
        &mut self,
        ledger: &mut Ledger,
        to: HolderId,
        denomination: Denomination,
        amount: u128,
    ) -> Result<(), TransportError> {
        self.strike(ledger, to, denomination, amount);
        self.inner.send(ledger, to, denomination, amount)
    }

    fn allowance(&self, from: &HolderId) -> u128 {
        self.inner.allowance(from)
    }

    fn pull(&mut self, ledger: &mut Ledger, from: HolderId, amount: u128) -> Result<(), TransportError> {
        self.inner.pull(ledger, from, amount)
    }
}

pub fn run(config: &SimConfig) -> ScenarioResult {
    let mut sim = match SimLedger::new(config.clone()) {
        Ok(sim) => sim,
        Err(e) => return setup_failed(NAME, e),
    };
    let mut failures = Vec::new();
    let threshold = config.ledger.withdrawal_threshold;
    let price = u128::try_from(sim.price()).unwrap_or(1).max(1);
    // Native amount worth a tenth of the threshold.
    let native_payout = (threshold / 10).saturating_mul(ledger::converter::DECIMAL_FACTOR) / price;
    let stable_payout = threshold / 10;

    for holder in 0..sim.holders.len() {
        for op in [
            SimOp::DepositNative {
                holder,
                amount: native_payout * ROUNDS as u128,
            },
            SimOp::DepositStable {
                holder,
                amount: stable_payout * ROUNDS as u128,
            },
        ] {
            if let StepOutcome::Rejected { code } = sim.apply(op) {
                failures.push(format!("funding deposit for holder {holder} rejected: {code}"));
            }
        }
    }

    let wallets_before: Vec<(u128, u128)> = sim
        .holders
        .iter()
        .map(|h| {
            (
                sim.transport.wallet(h, Denomination::Native),
                sim.transport.wallet(h, Denomination::Stable),
            )
        })
        .collect();

    let mut attacker = DrainingTransport::new(std::mem::take(&mut sim.transport), sim.now);
    for _ in 0..ROUNDS {
        for holder in 0..sim.holders.len() {
            for op in [
                SimOp::WithdrawNative {
                    holder,
                    amount: native_payout,
                },
                SimOp::WithdrawStable {
                    holder,
                    amount: stable_payout,
                },
            ] {
                attacker.now = sim.now + sim.config().step_secs;
                if let StepOutcome::Rejected { code } = sim.apply_via(op, &mut attacker) {
                    failures.push(format!("withdrawal for holder {holder} rejected: {code}"));
                }
            }
        }
    }
    let DrainingTransport {
        inner,
        attempts,
        refused,
        leaked,
        other_errors,
        ..
    } = attacker;
    sim.transport = inner;

    if leaked > 0 {
        failures.push(format!("{leaked} nested withdrawals accepted"));
    }
    if other_errors > 0 {
        failures.push(format!("{other_errors} nested withdrawals failed for a reason other than the lock"));
    }
    if refused != attempts {
        failures.push(format!("{refused} of {attempts} nested attempts refused"));
    }

    for (holder, (native_before, stable_before)) in sim.holders.iter().zip(wallets_before) {
        let native_paid = sim.transport.wallet(holder, Denomination::Native) - native_before;
        let stable_paid = sim.transport.wallet(holder, Denomination::Stable) - stable_before;
        if native_paid != native_payout * ROUNDS as u128 || stable_paid != stable_payout * ROUNDS as u128 {
            failures.push(format!(
                "holder {holder} paid {native_paid} native / {stable_paid} stable"
            ));
        }
        if sim.ledger.query_denomination_balance(holder, Denomination::Native) != 0
            || sim.ledger.query_denomination_balance(holder, Denomination::Stable) != 0
        {
            failures.push(format!("holder {holder} has a balance left after full withdrawal"));
        }
    }
    failures.extend(sim.violations());

    info!(attempts, refused, leaked, "Reentrancy drain finished");
    let details = format!(
        "{attempts} nested withdrawal attempts, {refused} refused, {leaked} accepted. Reserve now {} native / {} stable.",
        sim.transport.reserve(Denomination::Native),
        sim.transport.reserve(Denomination::Stable)
    );
    ScenarioResult::from_sim(NAME, &sim, &failures, details)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_refused() {
        let result = run(&SimConfig::default());
        assert!(result.passed, "{}", result.details);
        assert_eq!(result.operations_rejected, 0);
    }

    #[test]
    fn test_every_nested_attempt_counted() {
        let config = SimConfig {
            holders: 2,
            ..Default::default()
        };
        let result = run(&config);
        assert!(result.passed, "{}", result.details);
        // Two denominations, three rounds, two holders.
        assert!(result.details.starts_with("12 nested withdrawal attempts, 12 refused, 0 accepted"));
    }
}
