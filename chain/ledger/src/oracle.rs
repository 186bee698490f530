//! Price oracle gateway
//!
//! Wraps a single external price source and refuses to hand out a price that
//! is non-positive or older than the heartbeat. There is no retry and no
//! fallback source: a bad read aborts the enclosing operation.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};
use types::ids::FeedId;

use crate::errors::{FeedError, OracleError};

/// Maximum tolerated age of a price, in seconds.
pub const ORACLE_HEARTBEAT_SECS: i64 = 3600;

/// Decimal places of the price reported by the feed (USD per native unit).
pub const ORACLE_DECIMALS: u32 = 8;

/// Raw round data as reported by a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSnapshot {
    pub price: i128,
    pub updated_at: i64,
}

/// A price that passed the sign and freshness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPrice {
    pub price: u128,
    pub updated_at: i64,
    /// Seconds between `updated_at` and the read. Zero for future timestamps.
    pub age: i64,
}

/// An external price source.
pub trait PriceFeed: fmt::Debug + Send {
    /// Address of the source.
    fn id(&self) -> FeedId;

    /// Most recent completed round.
    fn latest_round(&self) -> Result<PriceSnapshot, FeedError>;
}

/// Check a snapshot against the sign and heartbeat rules.
pub fn validate_snapshot(snapshot: PriceSnapshot, now: i64) -> Result<ValidatedPrice, OracleError> {
    if snapshot.price <= 0 {
        return Err(OracleError::Invalid {
            price: snapshot.price,
        });
    }

    let age = now.saturating_sub(snapshot.updated_at).max(0);
    if age > ORACLE_HEARTBEAT_SECS {
        return Err(OracleError::Stale {
            updated_at: snapshot.updated_at,
            now,
            heartbeat: ORACLE_HEARTBEAT_SECS,
        });
    }

    Ok(ValidatedPrice {
        // Positive i128 always fits.
        price: snapshot.price as u128,
        updated_at: snapshot.updated_at,
        age,
    })
}

/// Gateway owning the current price source.
#[derive(Debug)]
pub struct OracleGateway {
    source: Box<dyn PriceFeed>,
}

impl OracleGateway {
    /// Wrap a source. The source is not read until the first conversion.
    pub fn new(source: Box<dyn PriceFeed>) -> Self {
        Self { source }
    }

    /// Address of the current source.
    pub fn source_id(&self) -> FeedId {
        self.source.id()
    }

    /// Read and validate the current price.
    pub fn fetch_price(&self, now: i64) -> Result<ValidatedPrice, OracleError> {
        let snapshot = self.source.latest_round().map_err(|e| {
            warn!(feed = %self.source.id(), error = %e, "Price feed read failed");
            OracleError::from(e)
        })?;

        let validated = validate_snapshot(snapshot, now).map_err(|e| {
            warn!(feed = %self.source.id(), error = %e, "Price rejected");
            e
        })?;

        debug!(
            feed = %self.source.id(),
            price = %validated.price,
            age = validated.age,
            "Price fetched"
        );
        Ok(validated)
    }

    /// Install a new source after it passes the same checks as a normal read.
    ///
    /// On failure the current source stays in place. Returns the previous
    /// source's address.
    pub fn replace_source(
        &mut self,
        candidate: Box<dyn PriceFeed>,
        now: i64,
    ) -> Result<FeedId, OracleError> {
        let snapshot = candidate.latest_round()?;
        validate_snapshot(snapshot, now)?;

        let previous = std::mem::replace(&mut self.source, candidate);
        Ok(previous.id())
    }
}

#[derive(Debug)]
struct ManualFeedState {
    round: Result<PriceSnapshot, FeedError>,
}

/// A settable in-process feed.
///
/// Clones share the same round, so a test or simulation keeps one handle and
/// hands another to the ledger, then moves the price from outside.
#[derive(Debug, Clone)]
pub struct ManualPriceFeed {
    id: FeedId,
    state: Arc<Mutex<ManualFeedState>>,
}

impl ManualPriceFeed {
    /// A feed that has published `price` at `updated_at`.
    pub fn new(id: impl Into<FeedId>, price: i128, updated_at: i64) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(ManualFeedState {
                round: Ok(PriceSnapshot { price, updated_at }),
            })),
        }
    }

    /// Publish a new round.
    pub fn set_price(&self, price: i128, updated_at: i64) {
        self.state().round = Ok(PriceSnapshot { price, updated_at });
    }

    /// Make subsequent reads fail.
    pub fn set_failure(&self, error: FeedError) {
        self.state().round = Err(error);
    }

    fn state(&self) -> MutexGuard<'_, ManualFeedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PriceFeed for ManualPriceFeed {
    fn id(&self) -> FeedId {
        self.id.clone()
    }

    fn latest_round(&self) -> Result<PriceSnapshot, FeedError> {
        self.state().round.clone()
    }
}
