//! Runs every scenario and prints the JSON export.
//!
//! Usage: `ledger-sim [config.json] [output.json]`

use anyhow::Context;
use simulation::config::SimConfig;
use simulation::{export, scenarios};

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            SimConfig::from_json_str(&json).with_context(|| format!("parsing config {path}"))?
        }
        None => SimConfig::default(),
    };
    tracing::info!(seed = config.seed, steps = config.steps, "Starting ledger simulation");

    let (results, metrics) = scenarios::run_all(&config);
    for result in &results {
        if result.passed {
            tracing::info!(scenario = %result.name, "Scenario passed");
        } else {
            tracing::warn!(scenario = %result.name, details = %result.details, "Scenario failed");
        }
    }

    let export = export::build_export(config.seed, results, &metrics);
    match args.next() {
        Some(path) => {
            export::write_to_file(&export, &path).with_context(|| format!("writing {path}"))?;
            tracing::info!(path = %path, "Export written");
        }
        None => println!("{}", export::export_json(&export)),
    }

    if !export.all_passed {
        anyhow::bail!("one or more scenarios failed");
    }
    Ok(())
}
