use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::model::quote::Price;
use crate::venues::TableSnapshot;

use super::table::{label_or_blank, locate_call_cells, parse_price_text, resolve_marks};
use super::{OkxConfig, Readiness, Selectors};

/// One headless Chromium instance, scoped to a single round.
///
/// `close` shuts the browser down cleanly. If a session is dropped without
/// `close` (early return, cancelled round) the CDP handler task is aborted and
/// chromiumoxide kills the child process when the `Browser` drops.
pub(super) struct OkxSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl OkxSession {
    pub(super) async fn open(config: &OkxConfig) -> Result<Self, SessionError> {
        let mut builder = BrowserConfig::builder().request_timeout(config.navigation_timeout);
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(SessionError::Config)?;

        let (browser, mut events) = Browser::launch(browser_config)
            .await
            .map_err(SessionError::Launch)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                // Unknown CDP messages from newer Chrome builds surface here.
                if let Err(e) = event {
                    debug!(error = %e, "cdp handler event error");
                }
            }
        });

        Ok(OkxSession { browser, handler })
    }

    /// Navigate to the chain, wait for it to render, read spot and marks.
    pub(super) async fn read_chain(
        &self,
        config: &OkxConfig,
        strikes: &[u64],
    ) -> Result<TableSnapshot, SessionError> {
        let page = self.navigate(&config.url, config.navigation_timeout).await?;
        wait_until_ready(&page, &config.selectors, config.readiness).await?;

        let spot = read_spot(&page, &config.selectors.spot).await;

        let strike_cells = page
            .find_elements(config.selectors.strike.as_str())
            .await
            .map_err(SessionError::Query)?;
        let mut labels = Vec::with_capacity(strike_cells.len());
        for cell in &strike_cells {
            labels.push(label_or_blank(cell.inner_text().await));
        }

        let mark_cells = page
            .find_elements(config.selectors.mark.as_str())
            .await
            .map_err(SessionError::Query)?;

        let located = locate_call_cells(&labels, strikes, mark_cells.len());
        debug!(
            strike_cells = labels.len(),
            mark_cells = mark_cells.len(),
            located = located.len(),
            "okx chain rendered"
        );

        let mut texts = Vec::with_capacity(located.len());
        for (strike, index) in located {
            let text = first_nested_text(&mark_cells[index], &config.selectors.mark_value).await;
            texts.push((strike, text));
        }

        Ok(TableSnapshot {
            spot,
            marks: resolve_marks(&texts),
        })
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<Page, SessionError> {
        let navigation = async {
            let page = self.browser.new_page(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(page)
        };
        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(source)) => Err(SessionError::Navigate {
                url: url.to_string(),
                source,
            }),
            Err(_) => Err(SessionError::Timeout(timeout)),
        }
    }

    pub(super) async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "closing browser failed");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "waiting for browser exit failed");
        }
        self.handler.abort();
    }
}

impl Drop for OkxSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

// ── Page reading ────────────────────────────────────────────────────

async fn wait_until_ready(
    page: &Page,
    selectors: &Selectors,
    readiness: Readiness,
) -> Result<(), SessionError> {
    match readiness {
        Readiness::FixedDelay(delay) => {
            tokio::time::sleep(delay).await;
        }
        Readiness::Poll {
            timeout,
            every,
            settle,
        } => {
            let started = Instant::now();
            loop {
                if table_populated(page, selectors).await? {
                    debug!(waited = ?started.elapsed(), "okx chain ready");
                    break;
                }
                if started.elapsed() >= timeout {
                    warn!(?timeout, "okx chain not populated in time, reading anyway");
                    break;
                }
                tokio::time::sleep(every).await;
            }
            tokio::time::sleep(settle).await;
        }
    }
    Ok(())
}

/// The chain counts as rendered once strike rows exist and every row has its
/// call and put mark cells.
async fn table_populated(page: &Page, selectors: &Selectors) -> Result<bool, SessionError> {
    let strikes = page
        .find_elements(selectors.strike.as_str())
        .await
        .map_err(SessionError::Query)?
        .len();
    if strikes == 0 {
        return Ok(false);
    }
    let marks = page
        .find_elements(selectors.mark.as_str())
        .await
        .map_err(SessionError::Query)?
        .len();
    Ok(marks >= strikes * 2)
}

async fn read_spot(page: &Page, selector: &str) -> Price {
    let text = match page.find_element(selector).await {
        Ok(element) => element.inner_text().await.ok().flatten(),
        Err(e) => {
            debug!(selector, error = %e, "okx spot element not found");
            None
        }
    };
    Price::from(text.as_deref().and_then(parse_price_text))
}

async fn first_nested_text(cell: &Element, selector: &str) -> Option<String> {
    let nested = cell.find_elements(selector).await.ok()?;
    nested.first()?.inner_text().await.ok().flatten()
}
