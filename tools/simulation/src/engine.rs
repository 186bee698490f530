//! Seeded simulation engine
//!
//! Wires a `Ledger` to a shared `ManualPriceFeed` and an `InMemoryTransport`,
//! generates operations from a seeded RNG, and checks the ledger's invariants
//! after every step. Holder and owner identifiers are derived from the seed, so
//! the same configuration always produces the same final snapshot.

use ledger::errors::LedgerError;
use ledger::events::LedgerEvent;
use ledger::snapshot::LedgerSnapshot;
use ledger::{InMemoryTransport, Ledger, ManualPriceFeed, ValueTransport};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use types::denomination::Denomination;
use types::ids::HolderId;
use uuid::Uuid;

use crate::config::SimConfig;
use crate::metrics::SimMetrics;

/// Identifier of the feed every simulation starts with.
pub const PRIMARY_FEED: &str = "feed:sim/primary";

/// One generated operation. Holders are referenced by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimOp {
    DepositNative { holder: usize, amount: u128 },
    DepositStable { holder: usize, amount: u128 },
    WithdrawNative { holder: usize, amount: u128 },
    WithdrawStable { holder: usize, amount: u128 },
    /// Publish a fresh round at the current clock.
    Reprice { price: i128 },
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Accepted { usd_value: u128 },
    Rejected { code: String },
    Repriced,
}

/// Recorded step, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    pub step: u64,
    pub time: i64,
    pub op: SimOp,
    pub outcome: StepOutcome,
}

/// A ledger under simulation.
pub struct SimLedger {
    pub ledger: Ledger,
    pub feed: ManualPriceFeed,
    pub transport: InMemoryTransport,
    pub holders: Vec<HolderId>,
    pub owner: HolderId,
    pub now: i64,
    pub metrics: SimMetrics,
    pub events: Vec<SimEvent>,
    price: i128,
    step: u64,
    config: SimConfig,
    rng: ChaCha8Rng,
}

impl SimLedger {
    /// Build a funded simulation from `config`.
    pub fn new(config: SimConfig) -> Result<Self, LedgerError> {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let owner = seeded_holder(&mut rng);
        let holders: Vec<HolderId> = (0..config.holders.max(1)).map(|_| seeded_holder(&mut rng)).collect();

        let feed = ManualPriceFeed::new(PRIMARY_FEED, config.initial_price, config.start_time);
        let ledger = Ledger::with_owner(config.ledger, Box::new(feed.clone()), owner)?;

        let mut transport = InMemoryTransport::new();
        for holder in &holders {
            transport.fund_wallet(*holder, Denomination::Native, config.wallet_native);
            transport.fund_wallet(*holder, Denomination::Stable, config.wallet_stable);
            transport.approve(*holder, config.wallet_stable);
        }

        Ok(Self {
            ledger,
            feed,
            transport,
            holders,
            owner,
            now: config.start_time,
            metrics: SimMetrics::new(),
            events: Vec::new(),
            price: config.initial_price,
            step: 0,
            config,
            rng,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current oracle price last published by the simulation.
    pub fn price(&self) -> i128 {
        self.price
    }

    /// Draw the next operation.
    ///
    /// Amounts are sized against the configured limits so that every
    /// validation branch is reached: some withdrawals exceed the threshold,
    /// some deposits run into the cap, some requests exceed the balance.
    pub fn random_op(&mut self) -> SimOp {
        let holder = self.rng.gen_range(0..self.holders.len().max(1));
        let threshold = self.config.ledger.withdrawal_threshold;
        let price = u128::try_from(self.price).unwrap_or(1).max(1);
        // Native amount worth roughly `usd` at the current price.
        let native_for = |usd: u128| usd.saturating_mul(ledger::converter::DECIMAL_FACTOR) / price;

        match self.rng.gen_range(0..100u32) {
            0..=29 => {
                let usd = self.rng.gen_range(1..=threshold.saturating_mul(3).max(1));
                SimOp::DepositNative {
                    holder,
                    amount: native_for(usd).max(1),
                }
            }
            30..=54 => SimOp::DepositStable {
                holder,
                amount: self.rng.gen_range(0..=threshold.saturating_mul(3)),
            },
            55..=74 => {
                let usd = self.rng.gen_range(1..=threshold.saturating_mul(3) / 2 + 1);
                SimOp::WithdrawNative {
                    holder,
                    amount: native_for(usd),
                }
            }
            75..=94 => SimOp::WithdrawStable {
                holder,
                amount: self.rng.gen_range(0..=threshold.saturating_mul(3) / 2),
            },
            _ => {
                // Random walk of up to ±5%.
                let bps = self.rng.gen_range(-500i128..=500);
                let next = self.price + self.price * bps / 10_000;
                SimOp::Reprice { price: next.max(1) }
            }
        }
    }

    /// Advance the clock one step and apply `op`.
    pub fn apply(&mut self, op: SimOp) -> StepOutcome {
        self.tick();

        let result = match op {
            SimOp::DepositNative { holder, amount } => {
                let holder = self.holder(holder);
                self.transport
                    .deposit_native(&mut self.ledger, holder, amount, self.now)
            }
            SimOp::DepositStable { holder, amount } => {
                let holder = self.holder(holder);
                self.ledger
                    .deposit_stable(holder, amount, &mut self.transport)
            }
            SimOp::WithdrawNative { holder, amount } => {
                let holder = self.holder(holder);
                self.ledger
                    .withdraw_native(holder, amount, self.now, &mut self.transport)
            }
            SimOp::WithdrawStable { holder, amount } => {
                let holder = self.holder(holder);
                self.ledger
                    .withdraw_stable(holder, amount, &mut self.transport)
            }
            SimOp::Reprice { price } => {
                self.feed.set_price(price, self.now);
                self.price = price;
                self.metrics.record_reprice();
                return self.record(op, StepOutcome::Repriced);
            }
        };
        self.finish(op, result)
    }

    /// Apply `op` with `transport` standing in for the simulation's own.
    ///
    /// Native deposits and repricing move no value through a transport and go
    /// through `apply` unchanged.
    pub fn apply_via(&mut self, op: SimOp, transport: &mut dyn ValueTransport) -> StepOutcome {
        let result = match op {
            SimOp::DepositStable { holder, amount } => {
                self.tick();
                let holder = self.holder(holder);
                self.ledger.deposit_stable(holder, amount, transport)
            }
            SimOp::WithdrawNative { holder, amount } => {
                self.tick();
                let holder = self.holder(holder);
                self.ledger.withdraw_native(holder, amount, self.now, transport)
            }
            SimOp::WithdrawStable { holder, amount } => {
                self.tick();
                let holder = self.holder(holder);
                self.ledger.withdraw_stable(holder, amount, transport)
            }
            SimOp::DepositNative { .. } | SimOp::Reprice { .. } => return self.apply(op),
        };
        self.finish(op, result)
    }

    /// Generate and apply `steps` random operations. Returns the violations
    /// found along the way, tagged with their step.
    pub fn run(&mut self, steps: usize) -> Vec<String> {
        let mut violations = Vec::new();
        for _ in 0..steps {
            let op = self.random_op();
            self.apply(op);
            for v in self.violations() {
                warn!(step = self.step, violation = %v, "Invariant violated");
                violations.push(format!("step {}: {}", self.step, v));
            }
        }
        violations
    }

    /// Invariants that must hold between any two operations.
    pub fn violations(&self) -> Vec<String> {
        let mut found = Vec::new();
        let state = self.ledger.query_state();

        if state.aggregate_total > state.global_cap {
            found.push(format!(
                "aggregate {} above cap {}",
                state.aggregate_total, state.global_cap
            ));
        }
        if self.ledger.is_locked() {
            found.push("execution lock still held".to_string());
        }
        for denomination in Denomination::ALL {
            let recorded = self.ledger.store().total_for(denomination);
            let held = self.transport.reserve(denomination);
            if recorded != held {
                found.push(format!(
                    "{denomination} recorded {recorded} but custody holds {held}"
                ));
            }
        }
        for event in &self.events {
            if let SimOp::WithdrawNative { .. } | SimOp::WithdrawStable { .. } = event.op {
                if let StepOutcome::Accepted { usd_value } = event.outcome {
                    if usd_value > state.withdrawal_threshold {
                        found.push(format!(
                            "step {} withdrew {} above threshold",
                            event.step, usd_value
                        ));
                    }
                }
            }
        }
        found
    }

    /// Persisted state of the ledger right now.
    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        self.ledger.snapshot()
    }

    pub fn holder(&self, index: usize) -> HolderId {
        self.holders[index % self.holders.len()]
    }

    fn tick(&mut self) {
        self.step += 1;
        self.now += self.config.step_secs;
    }

    fn finish(&mut self, op: SimOp, result: Result<LedgerEvent, LedgerError>) -> StepOutcome {
        let outcome = match result {
            Ok(event) => self.record_event(&event),
            Err(e) => {
                debug!(step = self.step, error = %e, "Simulated operation rejected");
                self.metrics.record_rejection(&e);
                StepOutcome::Rejected {
                    code: e.code().to_string(),
                }
            }
        };
        self.metrics
            .observe_aggregate(self.ledger.query_state().aggregate_total);
        self.record(op, outcome)
    }

    fn record_event(&mut self, event: &LedgerEvent) -> StepOutcome {
        match event {
            LedgerEvent::DepositSucceeded(e) => {
                self.metrics.record_deposit(e.usd_value);
                StepOutcome::Accepted {
                    usd_value: e.usd_value,
                }
            }
            LedgerEvent::WithdrawalSucceeded(e) => {
                self.metrics.record_withdrawal(e.usd_value);
                StepOutcome::Accepted {
                    usd_value: e.usd_value,
                }
            }
            other => StepOutcome::Rejected {
                code: format!("UNEXPECTED_{}", other.label()),
            },
        }
    }

    fn record(&mut self, op: SimOp, outcome: StepOutcome) -> StepOutcome {
        self.events.push(SimEvent {
            step: self.step,
            time: self.now,
            op,
            outcome: outcome.clone(),
        });
        outcome
    }
}

/// Holder identifier drawn from the run's RNG.
pub fn seeded_holder(rng: &mut ChaCha8Rng) -> HolderId {
    HolderId::from_uuid(Uuid::from_u128(rng.gen()))
}
