pub mod deribit;
pub mod okx;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::model::contract::Contract;
use crate::model::quote::{Price, VenueId};

// ── Index venue ─────────────────────────────────────────────────────

/// A venue with a request/response quote API: an index (spot) price and a
/// per-instrument mark price.
///
/// Implementations never fail the caller. Any transport or decode problem
/// comes back as `Price::Unavailable`.
#[async_trait]
pub trait IndexVenue: Send + Sync {
    fn id(&self) -> VenueId;

    /// Current index price of the underlying, quote currency.
    async fn spot_price(&self) -> Price;

    /// Raw mark price of one contract, as a ratio of the underlying.
    async fn mark_ratio(&self, contract: &Contract) -> Price;
}

// ── Price table source ──────────────────────────────────────────────

/// Everything a table venue yields for one round.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    pub spot: Price,
    /// Strike -> mark price. Strikes that could not be read may be absent.
    pub marks: BTreeMap<u64, Price>,
}

impl TableSnapshot {
    /// The degraded result of a failed session.
    pub fn unavailable() -> Self {
        TableSnapshot {
            spot: Price::Unavailable,
            marks: BTreeMap::new(),
        }
    }

    pub fn mark(&self, strike: u64) -> Price {
        self.marks.get(&strike).copied().unwrap_or(Price::Unavailable)
    }
}

/// A venue that publishes a whole option chain at once (spot plus a
/// strike -> mark table). How the table is obtained stays behind this trait.
///
/// Every call is self-contained: any session it opens is released before it
/// returns, on success and on failure.
#[async_trait]
pub trait PriceTableSource: Send + Sync {
    fn id(&self) -> VenueId;

    async fn snapshot(&self, strikes: &[u64]) -> TableSnapshot;
}
