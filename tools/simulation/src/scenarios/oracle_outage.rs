//! Oracle outage scenario
//!
//! The primary feed stops publishing, then publishes a zero price. Native
//! operations must be refused without touching any balance while stable
//! operations carry on. Recovery goes through pause, replacement of the price
//! source (a stale candidate is refused first) and unpause.

use ledger::oracle::ORACLE_HEARTBEAT_SECS;
use ledger::ManualPriceFeed;
use tracing::info;
use types::denomination::Denomination;
use types::numeric::whole_units;

use crate::config::SimConfig;
use crate::engine::{SimLedger, SimOp, StepOutcome};
use crate::scenarios::{setup_failed, ScenarioResult};

const NAME: &str = "oracle_outage";

/// Identifier of the replacement feed.
pub const BACKUP_FEED: &str = "feed:sim/backup";

pub fn run(config: &SimConfig) -> ScenarioResult {
    let mut sim = match SimLedger::new(config.clone()) {
        Ok(sim) => sim,
        Err(e) => return setup_failed(NAME, e),
    };
    let mut failures = Vec::new();
    let native_unit = whole_units(1, Denomination::Native).unwrap_or(1);
    let price = sim.price();

    // Healthy opening positions.
    let outcome = sim.apply(SimOp::DepositNative {
        holder: 0,
        amount: native_unit,
    });
    expect_accepted(&mut failures, "opening native deposit", outcome);
    let outcome = sim.apply(SimOp::DepositStable {
        holder: 1,
        amount: 1_000_000_000,
    });
    expect_accepted(&mut failures, "opening stable deposit", outcome);
    let store_before = sim.ledger.store().clone();

    // Feed goes quiet past its heartbeat.
    sim.now += ORACLE_HEARTBEAT_SECS;
    let outcome = sim.apply(SimOp::DepositNative {
        holder: 0,
        amount: native_unit,
    });
    expect_rejected(&mut failures, "native deposit on stale feed", "ORACLE_STALE", outcome);
    let outcome = sim.apply(SimOp::WithdrawNative {
        holder: 0,
        amount: native_unit / 1_000,
    });
    expect_rejected(&mut failures, "native withdrawal on stale feed", "ORACLE_STALE", outcome);
    let holder = sim.holder(0);
    if sim.ledger.query_balance(&holder, sim.now).is_ok() {
        failures.push("balance query succeeded on a stale feed".to_string());
    }
    if sim.ledger.store() != &store_before {
        failures.push("stale-feed rejections changed the store".to_string());
    }

    // Stable side keeps working through the outage.
    let outcome = sim.apply(SimOp::DepositStable {
        holder: 1,
        amount: 1_000_000,
    });
    expect_accepted(&mut failures, "stable deposit during outage", outcome);

    // Feed comes back with garbage.
    sim.feed.set_price(0, sim.now);
    let outcome = sim.apply(SimOp::DepositNative {
        holder: 0,
        amount: native_unit,
    });
    expect_rejected(&mut failures, "native deposit on zero price", "ORACLE_INVALID", outcome);

    // Recovery.
    let owner = sim.owner;
    if let Err(e) = sim.ledger.pause(owner) {
        failures.push(format!("pause failed: {e}"));
    }
    let stale_candidate = ManualPriceFeed::new(BACKUP_FEED, price, sim.now - ORACLE_HEARTBEAT_SECS - 1);
    if sim
        .ledger
        .set_price_source(owner, Box::new(stale_candidate), sim.now)
        .is_ok()
    {
        failures.push("stale replacement feed was accepted".to_string());
    }
    let backup = ManualPriceFeed::new(BACKUP_FEED, price, sim.now);
    if let Err(e) = sim.ledger.set_price_source(owner, Box::new(backup.clone()), sim.now) {
        failures.push(format!("fresh replacement feed refused: {e}"));
    }
    if let Err(e) = sim.ledger.unpause(owner) {
        failures.push(format!("unpause failed: {e}"));
    }
    sim.feed = backup;

    let outcome = sim.apply(SimOp::DepositNative {
        holder: 0,
        amount: native_unit,
    });
    expect_accepted(&mut failures, "native deposit after recovery", outcome);

    failures.extend(sim.violations());
    let state = sim.ledger.query_state();
    info!(
        price_source = %state.price_source,
        stale = sim.metrics.rejections_of("ORACLE_STALE"),
        invalid = sim.metrics.rejections_of("ORACLE_INVALID"),
        "Oracle outage finished"
    );

    let details = format!(
        "{} stale and {} invalid-price rejections; source now {}; aggregate {} USD.",
        sim.metrics.rejections_of("ORACLE_STALE"),
        sim.metrics.rejections_of("ORACLE_INVALID"),
        state.price_source,
        state.aggregate_display
    );
    ScenarioResult::from_sim(NAME, &sim, &failures, details)
}

fn expect_accepted(failures: &mut Vec<String>, what: &str, outcome: StepOutcome) {
    if !matches!(outcome, StepOutcome::Accepted { .. }) {
        failures.push(format!("{what}: expected acceptance, got {outcome:?}"));
    }
}

fn expect_rejected(failures: &mut Vec<String>, what: &str, code: &str, outcome: StepOutcome) {
    match &outcome {
        StepOutcome::Rejected { code: got } if got == code => {}
        _ => failures.push(format!("{what}: expected {code}, got {outcome:?}")),
    }
}
