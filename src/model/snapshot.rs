use chrono::{DateTime, Utc};

use super::contract::Contract;
use super::quote::{Price, UNAVAILABLE, VenueId};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One aligned sample of both venues.
///
/// Spot prices are plain numbers: a round without both spots never becomes a
/// row. Option columns carry `Price` so gaps keep their column.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub timestamp: DateTime<Utc>,
    pub table_spot: f64,
    pub index_spot: f64,
    /// Index-venue option prices in contract order, quote currency.
    pub index_marks: Vec<Price>,
    /// Table-venue option prices in strike order.
    pub table_marks: Vec<Price>,
}

impl SnapshotRow {
    /// Number of price cells (everything but the timestamp).
    pub fn price_width(&self) -> usize {
        2 + self.index_marks.len() + self.table_marks.len()
    }

    /// CSV cells, timestamp first.
    pub fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(1 + self.price_width());
        record.push(self.timestamp.format(TIMESTAMP_FORMAT).to_string());
        record.push(self.table_spot.to_string());
        record.push(self.index_spot.to_string());
        record.extend(self.index_marks.iter().map(|p| format_cell(p, Some(2))));
        record.extend(self.table_marks.iter().map(|p| format_cell(p, None)));
        record
    }

    pub fn unavailable_count(&self) -> usize {
        self.index_marks
            .iter()
            .chain(&self.table_marks)
            .filter(|p| !p.is_available())
            .count()
    }
}

fn format_cell(price: &Price, decimals: Option<usize>) -> String {
    match (price, decimals) {
        (Price::Available(v), Some(d)) => format!("{v:.d$}"),
        (Price::Available(v), None) => v.to_string(),
        (Price::Unavailable, _) => UNAVAILABLE.to_string(),
    }
}

/// Column naming for one log file. Fixed for the life of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    pub index_venue: VenueId,
    pub table_venue: VenueId,
    pub underlying: String,
    pub instruments: Vec<String>,
    pub strikes: Vec<u64>,
}

impl RowLayout {
    pub fn new(
        index_venue: VenueId,
        table_venue: VenueId,
        contracts: &[Contract],
    ) -> Self {
        RowLayout {
            index_venue,
            table_venue,
            underlying: contracts
                .first()
                .map(|c| c.underlying.clone())
                .unwrap_or_default(),
            instruments: contracts.iter().map(Contract::instrument_name).collect(),
            strikes: contracts.iter().map(|c| c.strike).collect(),
        }
    }

    pub fn price_width(&self) -> usize {
        2 + self.instruments.len() + self.strikes.len()
    }

    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(1 + self.price_width());
        header.push("timestamp".to_string());
        header.push(format!("{}_{}_price", self.table_venue, self.underlying));
        header.push(format!("{}_{}_price", self.index_venue, self.underlying));
        header.extend(
            self.instruments
                .iter()
                .map(|name| format!("{}_{}", self.index_venue, name)),
        );
        header.extend(
            self.strikes
                .iter()
                .map(|strike| format!("{}_{}", self.table_venue, strike)),
        );
        header
    }

    pub fn fits(&self, row: &SnapshotRow) -> bool {
        row.index_marks.len() == self.instruments.len()
            && row.table_marks.len() == self.strikes.len()
    }
}
