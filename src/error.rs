use thiserror::Error;

use crate::model::quote::VenueId;

/// Failure obtaining one value from one venue. Always recovered into
/// `Price::Unavailable` at the venue boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
}

/// Failure driving the rendered-page session. Degrades every Venue B value
/// of the round to `Unavailable`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid browser configuration: {0}")]
    Config(String),
    #[error("browser launch failed: {0}")]
    Launch(#[source] chromiumoxide::error::CdpError),
    #[error("navigation to {url} failed: {source}")]
    Navigate {
        url: String,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    #[error("page did not load within {0:?}")]
    Timeout(std::time::Duration),
    #[error("element query failed: {0}")]
    Query(#[source] chromiumoxide::error::CdpError),
}

/// A round that could not produce a row.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoundFailure {
    #[error("could not get both spot prices ({})", describe_missing(.missing))]
    SpotUnavailable { missing: Vec<VenueId> },
}

fn describe_missing(missing: &[VenueId]) -> String {
    missing
        .iter()
        .map(|v| format!("{v} spot missing"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Invalid static configuration, reported once at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid expiry code '{0}', expected e.g. 3AUG25")]
    Expiry(String),
    #[error("invalid stop time '{0}', expected HH:MM")]
    StopTime(String),
    #[error("unknown timezone '{0}'")]
    Timezone(String),
    #[error("at least one strike is required")]
    NoStrikes,
    #[error("strike {0} is listed more than once")]
    DuplicateStrike(u64),
}
