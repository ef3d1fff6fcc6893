//! Positional matching for the OKX option chain.
//!
//! The chain renders one `td.strike` cell per row and, in a separate flat
//! sequence, two `td.mark-price` cells per row (call, then put). The call cell
//! for the strike at position `i` is therefore mark cell `2 * i`.

use std::collections::BTreeMap;
use std::fmt::Display;

use tracing::debug;

use crate::model::quote::{Price, round_to};

/// Decimal places kept for scraped mark prices.
pub const MARK_DECIMALS: u32 = 6;

/// Mark cells per strike row.
const CELLS_PER_STRIKE: usize = 2;

fn strip_number(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect()
}

/// Parse a strike label like `106,000`.
pub fn parse_strike_label(text: &str) -> Option<u64> {
    strip_number(text).parse().ok()
}

/// Parse a rendered price like `$117,950.50` or `0.0123`.
pub fn parse_price_text(text: &str) -> Option<f64> {
    strip_number(text)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Index of the call mark cell for the strike row at `position`.
pub fn call_cell_index(position: usize) -> usize {
    position * CELLS_PER_STRIKE
}

/// Text of a strike cell. A cell that could not be read (detached during a
/// re-render) becomes a blank label: it keeps its row position but matches no
/// strike.
pub fn label_or_blank<E: Display>(read: Result<Option<String>, E>) -> String {
    match read {
        Ok(text) => text.unwrap_or_default(),
        Err(e) => {
            debug!(error = %e, "strike cell unreadable");
            String::new()
        }
    }
}

/// For every label that names a configured strike, the mark cell holding its
/// call price. Labels outside the configured set are skipped, as are strikes
/// whose cell would lie past `cell_count`. The first occurrence of a strike
/// wins.
pub fn locate_call_cells(labels: &[String], strikes: &[u64], cell_count: usize) -> Vec<(u64, usize)> {
    let mut located: Vec<(u64, usize)> = Vec::new();
    for (position, label) in labels.iter().enumerate() {
        let Some(strike) = parse_strike_label(label) else {
            continue;
        };
        if !strikes.contains(&strike) || located.iter().any(|(s, _)| *s == strike) {
            continue;
        }
        let index = call_cell_index(position);
        if index < cell_count {
            located.push((strike, index));
        }
    }
    located
}

/// Turn the text read from each located cell into a strike -> price map.
/// `None` text (no nested price element) and unparsable text become
/// `Unavailable`. Configured strikes that were never located are absent.
pub fn resolve_marks(cells: &[(u64, Option<String>)]) -> BTreeMap<u64, Price> {
    cells
        .iter()
        .map(|(strike, text)| {
            let price = text
                .as_deref()
                .and_then(parse_price_text)
                .map(|v| round_to(v, MARK_DECIMALS));
            (*strike, Price::from(price))
        })
        .collect()
}
