use chrono::{DateTime, SubsecRound, Utc};
use tracing::debug;

use crate::error::RoundFailure;
use crate::model::contract::Contract;
use crate::model::quote::{Price, Quote, round_to};
use crate::model::snapshot::{RowLayout, SnapshotRow};
use crate::venues::{IndexVenue, PriceTableSource};

/// Decimal places of index-venue option prices in quote currency.
pub const QUOTE_DECIMALS: u32 = 2;

/// Convert an index-venue mark (ratio of the underlying) into quote currency
/// using that same venue's spot.
pub fn normalize_mark(ratio: Price, index_spot: f64) -> Price {
    ratio.map(|r| round_to(r * index_spot, QUOTE_DECIMALS))
}

/// Runs one sampling round across both venues and aligns the results into a
/// single row. Holds no row history.
pub struct Aggregator {
    index: Box<dyn IndexVenue>,
    table: Box<dyn PriceTableSource>,
    contracts: Vec<Contract>,
    strikes: Vec<u64>,
    layout: RowLayout,
}

impl Aggregator {
    pub fn new(
        index: Box<dyn IndexVenue>,
        table: Box<dyn PriceTableSource>,
        contracts: Vec<Contract>,
    ) -> Self {
        let layout = RowLayout::new(index.id(), table.id(), &contracts);
        let strikes = contracts.iter().map(|c| c.strike).collect();
        Aggregator {
            index,
            table,
            contracts,
            strikes,
            layout,
        }
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Sample both venues once. Fails only when a spot price is missing;
    /// option-level gaps become `Unavailable` cells.
    pub async fn sample_once(&self, now: DateTime<Utc>) -> Result<SnapshotRow, RoundFailure> {
        let index_spot = Quote::spot(self.index.id(), self.index.spot_price().await, now);
        let table = self.table.snapshot(&self.strikes).await;
        let table_spot = Quote::spot(self.table.id(), table.spot, now);
        debug!(?index_spot, ?table_spot, "spot quotes");

        let (index_spot, table_spot) = match (index_spot.price, table_spot.price) {
            (Price::Available(a), Price::Available(b)) => (a, b),
            (a, b) => {
                let mut missing = Vec::new();
                if !a.is_available() {
                    missing.push(index_spot.venue);
                }
                if !b.is_available() {
                    missing.push(table_spot.venue);
                }
                return Err(RoundFailure::SpotUnavailable { missing });
            }
        };

        let mut index_marks = Vec::with_capacity(self.contracts.len());
        for contract in &self.contracts {
            let price = normalize_mark(self.index.mark_ratio(contract).await, index_spot);
            let quote = Quote::contract(self.index.id(), contract, price, now);
            debug!(instrument = %contract.instrument_name(), price = ?quote.price, "option quote");
            index_marks.push(quote.price);
        }

        let table_marks = self.strikes.iter().map(|&s| table.mark(s)).collect();

        Ok(SnapshotRow {
            timestamp: now.trunc_subsecs(0),
            table_spot,
            index_spot,
            index_marks,
            table_marks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_with_index_spot() {
        assert_eq!(
            normalize_mark(Price::Available(0.0123), 100_000.00),
            Price::Available(1230.00)
        );
        assert_eq!(normalize_mark(Price::Unavailable, 100_000.00), Price::Unavailable);
    }
}
