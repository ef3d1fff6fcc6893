mod session;
pub mod table;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::model::quote::VenueId;
use crate::venues::{PriceTableSource, TableSnapshot};

use session::OkxSession;

pub const OKX: VenueId = VenueId("OKX");
pub const OKX_CHAIN_URL: &str = "https://www.okx.com/trade-option-chain/btc-usd";

/// CSS selectors for the parts of the chain page we read.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub spot: String,
    pub strike: String,
    pub mark: String,
    /// Element inside a mark cell holding the price text.
    pub mark_value: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Selectors {
            spot: "div.index_last__T0kNQ".to_string(),
            strike: "td.strike".to_string(),
            mark: "td.mark-price".to_string(),
            mark_value: "p".to_string(),
        }
    }
}

/// How to decide the rendered page is ready to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Sleep a fixed time after navigation.
    FixedDelay(Duration),
    /// Poll until the chain table is populated or `timeout` elapses, then
    /// wait `settle` for cell contents to fill in.
    Poll {
        timeout: Duration,
        every: Duration,
        settle: Duration,
    },
}

impl Readiness {
    /// Poll every 500ms for up to `timeout`, then settle for one second.
    pub fn poll(timeout: Duration) -> Self {
        Readiness::Poll {
            timeout,
            every: Duration::from_millis(500),
            settle: Duration::from_secs(1),
        }
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::poll(Duration::from_secs(8))
    }
}

#[derive(Debug, Clone)]
pub struct OkxConfig {
    pub url: String,
    pub selectors: Selectors,
    pub readiness: Readiness,
    pub navigation_timeout: Duration,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for OkxConfig {
    fn default() -> Self {
        OkxConfig {
            url: OKX_CHAIN_URL.to_string(),
            selectors: Selectors::default(),
            readiness: Readiness::default(),
            navigation_timeout: Duration::from_secs(30),
            chrome_executable: None,
        }
    }
}

/// OKX option chain read from the public web page in a headless browser.
/// Each snapshot runs in a fresh browser session.
pub struct OkxChain {
    config: OkxConfig,
}

impl OkxChain {
    pub fn new(config: OkxConfig) -> Self {
        OkxChain { config }
    }
}

#[async_trait]
impl PriceTableSource for OkxChain {
    fn id(&self) -> VenueId {
        OKX
    }

    async fn snapshot(&self, strikes: &[u64]) -> TableSnapshot {
        let session = match OkxSession::open(&self.config).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "okx session failed to start");
                return TableSnapshot::unavailable();
            }
        };

        let result = session.read_chain(&self.config, strikes).await;
        session.close().await;

        match result {
            Ok(snapshot) => {
                debug!(spot = ?snapshot.spot, marks = snapshot.marks.len(), "okx snapshot");
                snapshot
            }
            Err(e) => {
                warn!(error = %e, "okx scraping failed");
                TableSnapshot::unavailable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium + network access
    async fn live_chain_snapshot() {
        let chain = OkxChain::new(OkxConfig::default());
        let snapshot = chain.snapshot(&[100_000, 110_000, 120_000]).await;
        assert!(snapshot.spot.is_available());
    }
}
