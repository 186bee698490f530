//! Scenario simulation modules
//!
//! Each scenario drives the ledger through one adversarial or stressful
//! situation and reports whether its invariants held.

pub mod random_flow;
pub mod oracle_outage;
pub mod reentrancy_drain;
pub mod cap_saturation;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::engine::SimLedger;
use crate::metrics::SimMetrics;

/// Result of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub steps_run: u64,
    pub operations_accepted: u64,
    pub operations_rejected: u64,
    pub events_emitted: usize,
    pub passed: bool,
    pub details: String,
}

impl ScenarioResult {
    /// Summarize a finished simulation. Any invariant violation or failed
    /// expectation fails the scenario.
    pub(crate) fn from_sim(name: &str, sim: &SimLedger, failures: &[String], details: String) -> Self {
        let passed = failures.is_empty();
        let details = if passed {
            details
        } else {
            format!("{details} Failures: {}", failures.join("; "))
        };
        Self {
            name: name.to_string(),
            steps_run: sim.events.len() as u64,
            operations_accepted: sim.metrics.accepted,
            operations_rejected: sim.metrics.rejected,
            events_emitted: sim.ledger.events().len(),
            passed,
            details,
        }
    }
}

/// Run every scenario with `config`. Metrics are those of the random flow.
pub fn run_all(config: &SimConfig) -> (Vec<ScenarioResult>, SimMetrics) {
    let (flow, metrics) = random_flow::run_detailed(config);
    let results = vec![
        flow,
        oracle_outage::run(config),
        reentrancy_drain::run(config),
        cap_saturation::run(config),
    ];
    (results, metrics)
}

/// Result for a scenario that could not even start.
pub(crate) fn setup_failed(name: &str, error: impl std::fmt::Display) -> ScenarioResult {
    ScenarioResult {
        name: name.to_string(),
        steps_run: 0,
        operations_accepted: 0,
        operations_rejected: 0,
        events_emitted: 0,
        passed: false,
        details: format!("Setup failed: {error}"),
    }
}
