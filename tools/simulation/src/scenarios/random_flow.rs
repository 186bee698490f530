//! Random operation flow
//!
//! A seeded mix of deposits and withdrawals in both denominations under a
//! random-walk price. Checks conservation, the cap and the threshold after
//! every step.

use tracing::info;

use crate::config::SimConfig;
use crate::engine::SimLedger;
use crate::metrics::SimMetrics;
use crate::scenarios::{setup_failed, ScenarioResult};

const NAME: &str = "random_flow";

/// Run `config.steps` random operations.
pub fn run(config: &SimConfig) -> ScenarioResult {
    run_detailed(config).0
}

/// Like `run`, also returning the run's metrics.
pub fn run_detailed(config: &SimConfig) -> (ScenarioResult, SimMetrics) {
    let mut sim = match SimLedger::new(config.clone()) {
        Ok(sim) => sim,
        Err(e) => return (setup_failed(NAME, e), SimMetrics::new()),
    };

    let failures = sim.run(config.steps);
    let state = sim.ledger.query_state();
    info!(
        seed = config.seed,
        steps = config.steps,
        accepted = sim.metrics.accepted,
        rejected = sim.metrics.rejected,
        aggregate_total = %state.aggregate_total,
        "Random flow finished"
    );

    let details = format!(
        "{} operations, {} accepted ({}), {} repricings. Final aggregate {} USD, peak {} USD, final price {}.",
        sim.metrics.operations,
        sim.metrics.accepted,
        sim.metrics.acceptance_rate(),
        sim.metrics.reprices,
        state.aggregate_display,
        sim.metrics.peak_aggregate_usd(),
        sim.price()
    );
    let result = ScenarioResult::from_sim(NAME, &sim, &failures, details);
    (result, sim.metrics)
}
