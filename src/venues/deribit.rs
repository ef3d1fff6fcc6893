use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::model::contract::Contract;
use crate::model::quote::{Price, VenueId};
use crate::venues::IndexVenue;

pub const DERIBIT: VenueId = VenueId("Deribit");
pub const DERIBIT_API_URL: &str = "https://www.deribit.com/api/v2/public";
pub const DEFAULT_INDEX_NAME: &str = "btc_usd";

// ── Deribit API types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct IndexPrice {
    index_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OrderBook {
    mark_price: Option<f64>,
}

// ── Response parsing ────────────────────────────────────────────────

fn parse_result<T: DeserializeOwned>(body: &str) -> Result<T, SourceError> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    envelope.result.ok_or(SourceError::MissingField("result"))
}

/// `result.index_price` from a `get_index_price` response.
pub fn parse_index_price(body: &str) -> Result<f64, SourceError> {
    parse_result::<IndexPrice>(body)?
        .index_price
        .ok_or(SourceError::MissingField("result.index_price"))
}

/// `result.mark_price` from a `get_order_book` response. A missing mark is an
/// error, never zero.
pub fn parse_mark_price(body: &str) -> Result<f64, SourceError> {
    parse_result::<OrderBook>(body)?
        .mark_price
        .ok_or(SourceError::MissingField("result.mark_price"))
}

// ── Deribit client ──────────────────────────────────────────────────

/// Stateless REST client for Deribit's public endpoints. One GET per value,
/// no retries.
pub struct DeribitClient {
    client: reqwest::Client,
    base_url: String,
    index_name: String,
}

impl DeribitClient {
    pub fn new(base_url: &str, index_name: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("optchain-sampler/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("creating Deribit HTTP client")?;

        Ok(DeribitClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index_name: index_name.to_string(),
        })
    }

    async fn get(&self, method: &str, query: &[(&str, &str)]) -> Result<String, SourceError> {
        let body = self
            .client
            .get(format!("{}/{}", self.base_url, method))
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    pub async fn fetch_index_price(&self) -> Result<f64, SourceError> {
        let body = self
            .get("get_index_price", &[("index_name", self.index_name.as_str())])
            .await?;
        parse_index_price(&body)
    }

    pub async fn fetch_mark_ratio(&self, instrument: &str) -> Result<f64, SourceError> {
        let body = self
            .get("get_order_book", &[("instrument_name", instrument)])
            .await?;
        parse_mark_price(&body)
    }
}

#[async_trait]
impl IndexVenue for DeribitClient {
    fn id(&self) -> VenueId {
        DERIBIT
    }

    async fn spot_price(&self) -> Price {
        match self.fetch_index_price().await {
            Ok(price) => {
                debug!(index = %self.index_name, price, "deribit index price");
                Price::Available(price)
            }
            Err(e) => {
                warn!(index = %self.index_name, error = %e, "deribit index price unavailable");
                Price::Unavailable
            }
        }
    }

    async fn mark_ratio(&self, contract: &Contract) -> Price {
        let instrument = contract.instrument_name();
        match self.fetch_mark_ratio(&instrument).await {
            Ok(mark) => Price::Available(mark),
            Err(e) => {
                warn!(%instrument, error = %e, "deribit mark price unavailable");
                Price::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_index_price() {
        let body = r#"{"jsonrpc":"2.0","result":{"index_price":117943.12,"estimated_delivery_price":117943.12},"usIn":1,"usOut":2}"#;
        assert_eq!(parse_index_price(body).unwrap(), 117_943.12);
    }

    #[test]
    fn reads_mark_price() {
        let body = r#"{"jsonrpc":"2.0","result":{"instrument_name":"BTC-3AUG25-106000-C","mark_price":0.0123,"best_bid_price":0.012}}"#;
        assert_eq!(parse_mark_price(body).unwrap(), 0.0123);
    }

    #[test]
    fn missing_mark_is_an_error_not_zero() {
        let body = r#"{"jsonrpc":"2.0","result":{"instrument_name":"BTC-3AUG25-106000-C"}}"#;
        assert!(matches!(
            parse_mark_price(body),
            Err(SourceError::MissingField("result.mark_price"))
        ));
    }

    #[test]
    fn error_payload_has_no_result() {
        let body = r#"{"jsonrpc":"2.0","error":{"message":"instrument_not_found","code":10000}}"#;
        assert!(matches!(
            parse_mark_price(body),
            Err(SourceError::MissingField("result"))
        ));
    }

    #[test]
    fn garbage_body_is_a_decode_error() {
        assert!(matches!(
            parse_index_price("<html>502</html>"),
            Err(SourceError::Decode(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn live_index_price() {
        let client =
            DeribitClient::new(DERIBIT_API_URL, DEFAULT_INDEX_NAME, Duration::from_secs(10)).unwrap();
        let price = client.fetch_index_price().await.unwrap();
        assert!(price > 0.0);
    }
}
