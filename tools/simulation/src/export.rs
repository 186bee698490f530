//! Scenario and metrics export
//!
//! Serializes scenario results and metrics to JSON for external consumption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::SimMetrics;
use crate::scenarios::ScenarioResult;

/// Combined export of one simulation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationExport {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub results: Vec<ScenarioResult>,
    pub metrics: SimMetrics,
    pub all_passed: bool,
}

/// Build an export stamped with the current time.
pub fn build_export(seed: u64, results: Vec<ScenarioResult>, metrics: &SimMetrics) -> SimulationExport {
    let all_passed = results.iter().all(|r| r.passed);
    SimulationExport {
        version: crate::VERSION.to_string(),
        generated_at: Utc::now(),
        seed,
        results,
        metrics: metrics.clone(),
        all_passed,
    }
}

/// Export as pretty JSON.
pub fn export_json(export: &SimulationExport) -> String {
    serde_json::to_string_pretty(export).unwrap_or_default()
}

/// Write export to a file path.
pub fn write_to_file(export: &SimulationExport, path: &str) -> std::io::Result<()> {
    let json = export_json(export);
    std::fs::write(path, json)
}
