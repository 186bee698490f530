//! Cap saturation scenario
//!
//! Holders deposit in fixed chunks, alternating denominations, until the
//! global cap refuses one. The aggregate must never pass the cap, the refused
//! deposit must leave custody untouched, and a withdrawal must reopen exactly
//! the headroom it frees.

use tracing::info;

use crate::config::SimConfig;
use crate::engine::{SimLedger, SimOp, StepOutcome};
use crate::scenarios::{setup_failed, ScenarioResult};

const NAME: &str = "cap_saturation";

pub fn run(config: &SimConfig) -> ScenarioResult {
    let mut sim = match SimLedger::new(config.clone()) {
        Ok(sim) => sim,
        Err(e) => return setup_failed(NAME, e),
    };
    let mut failures = Vec::new();
    let cap = config.ledger.global_cap;
    // Seven chunks overshoot the cap, six fit.
    let chunk = cap / 7 + 1;
    let price = u128::try_from(sim.price()).unwrap_or(1).max(1);
    let native_chunk = chunk.saturating_mul(ledger::converter::DECIMAL_FACTOR) / price;

    let mut deposits = 0u64;
    let mut refused_at = None;
    for i in 0..=config.holders.max(1) * 20 {
        let holder = i % config.holders.max(1);
        let op = if i % 2 == 0 {
            SimOp::DepositStable { holder, amount: chunk }
        } else {
            SimOp::DepositNative {
                holder,
                amount: native_chunk,
            }
        };
        let aggregate = sim.ledger.query_state().aggregate_total;
        match sim.apply(op) {
            StepOutcome::Accepted { .. } => deposits += 1,
            StepOutcome::Rejected { code } if code == "CAP_EXCEEDED" => {
                refused_at = Some(aggregate);
                break;
            }
            other => failures.push(format!("deposit {i}: unexpected {other:?}")),
        }
    }

    let aggregate = sim.ledger.query_state().aggregate_total;
    match refused_at {
        None => failures.push("cap never refused a deposit".to_string()),
        Some(before) if before != aggregate => {
            failures.push(format!("refused deposit moved aggregate {before} -> {aggregate}"))
        }
        Some(_) => {}
    }
    if aggregate > cap {
        failures.push(format!("aggregate {aggregate} above cap {cap}"));
    }

    // Free some headroom and fill it exactly.
    let release = config.ledger.withdrawal_threshold.min(chunk);
    if let StepOutcome::Rejected { code } = sim.apply(SimOp::WithdrawStable {
        holder: 0,
        amount: release,
    }) {
        failures.push(format!("headroom withdrawal rejected: {code}"));
    }
    let headroom = cap.saturating_sub(sim.ledger.query_state().aggregate_total);
    if let StepOutcome::Rejected { code } = sim.apply(SimOp::DepositStable {
        holder: 0,
        amount: headroom,
    }) {
        failures.push(format!("deposit filling headroom rejected: {code}"));
    }
    if sim.ledger.query_state().aggregate_total != cap {
        failures.push("aggregate not exactly at cap after filling headroom".to_string());
    }
    failures.extend(sim.violations());

    info!(deposits, cap = %cap, "Cap saturation finished");
    let details = format!(
        "{deposits} chunked deposits of {chunk} before the cap bound; peak aggregate {} USD.",
        sim.metrics.peak_aggregate_usd()
    );
    ScenarioResult::from_sim(NAME, &sim, &failures, details)
}
