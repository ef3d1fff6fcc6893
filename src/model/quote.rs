use std::fmt;

use chrono::{DateTime, Utc};

use super::contract::Contract;

/// Placeholder written in place of a price that could not be obtained.
pub const UNAVAILABLE: &str = "N/A";

/// Short name identifying a venue in log columns and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VenueId(pub &'static str);

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A price in quote currency, or the explicit absence of one.
/// `Unavailable` is never conflated with zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Price {
    Available(f64),
    Unavailable,
}

impl Price {
    pub fn is_available(&self) -> bool {
        matches!(self, Price::Available(_))
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Price {
        match self {
            Price::Available(v) => Price::Available(f(v)),
            Price::Unavailable => Price::Unavailable,
        }
    }
}

impl From<Option<f64>> for Price {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Price::Available(v),
            _ => Price::Unavailable,
        }
    }
}

/// What a quote prices.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Spot,
    Contract(Contract),
}

/// One price sample from one venue. Lives for a single round.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub venue: VenueId,
    pub subject: Subject,
    pub price: Price,
    pub sampled_at: DateTime<Utc>,
}

impl Quote {
    pub fn spot(venue: VenueId, price: Price, sampled_at: DateTime<Utc>) -> Self {
        Quote {
            venue,
            subject: Subject::Spot,
            price,
            sampled_at,
        }
    }

    pub fn contract(
        venue: VenueId,
        contract: &Contract,
        price: Price,
        sampled_at: DateTime<Utc>,
    ) -> Self {
        Quote {
            venue,
            subject: Subject::Contract(contract.clone()),
            price,
            sampled_at,
        }
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
