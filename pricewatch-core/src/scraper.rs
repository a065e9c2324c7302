//! Quote scraping: one instrument in, one decimal price (or a
//! classified failure) out.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;
use url::Url;

use pricewatch_model::Instrument;

use crate::browser::{BrowserConfig, BrowserSession};
use crate::error::ScrapeError;
use crate::retry::{Backoff, RetryError, retry_with_backoff};

use std::str::FromStr;
use std::time::Duration;

/// CSS class of the element carrying the current quote on the page.
pub const PRICE_SELECTOR: &str = ".mod-ui-data-list__value";

/// How long each attempt waits for the price element.
const PRICE_WAIT: Duration = Duration::from_secs(10);

/// Source of live quotes, keyed by instrument symbol. Seam between
/// the orchestrator and the browser machinery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Produce the instrument's current price, retrying transient
    /// faults internally. The error carries whether retries were
    /// exhausted or a permanent fault short-circuited them.
    async fn fetch_quote(
        &self,
        instrument: &Instrument,
    ) -> Result<Decimal, RetryError<ScrapeError>>;
}

/// Scrapes quotes from the markets.ft.com tearsheet pages through a
/// headless browser, under the bounded-backoff retry policy.
#[derive(Debug, Clone)]
pub struct FtQuoteScraper {
    browser: BrowserConfig,
    quote_url: Url,
    backoff: Backoff,
}

impl FtQuoteScraper {
    /// Build a scraper for the given quote page base URL; the symbol
    /// is appended as the `s` query parameter.
    pub fn new(browser: BrowserConfig, quote_url: Url) -> Self {
        Self {
            browser,
            quote_url,
            backoff: Backoff::default(),
        }
    }

    /// Override the default retry schedule.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn page_url(&self, symbol: &str) -> Url {
        let mut url = self.quote_url.clone();
        url.query_pairs_mut().clear().append_pair("s", symbol);
        url
    }

    /// One attempt: fresh session, navigate, consent, read, teardown.
    /// The session is closed on every path out of here, success or
    /// failure, and never handed to a later attempt.
    async fn attempt(
        &self,
        instrument: &Instrument,
        attempt: u32,
    ) -> Result<Decimal, ScrapeError> {
        debug!(symbol = %instrument.symbol, attempt, "starting scrape attempt");
        let mut session = BrowserSession::open(&self.browser).await?;
        let outcome = self.read_price_text(&mut session, instrument).await;
        session.close().await;

        let text = outcome?;
        debug!(symbol = %instrument.symbol, %text, "found price text");
        parse_price(&instrument.symbol, &text)
    }

    async fn read_price_text(
        &self,
        session: &mut BrowserSession,
        instrument: &Instrument,
    ) -> Result<String, ScrapeError> {
        session
            .navigate(self.page_url(&instrument.symbol).as_str())
            .await?;
        session.dismiss_consent_if_present().await;
        session.wait_for_text(PRICE_SELECTOR, PRICE_WAIT).await
    }
}

#[async_trait]
impl QuoteSource for FtQuoteScraper {
    async fn fetch_quote(
        &self,
        instrument: &Instrument,
    ) -> Result<Decimal, RetryError<ScrapeError>> {
        // Owned captures keep the retry future provably `Send` under
        // the boxed-future desugaring; a borrowing closure trips
        // rustc's higher-ranked auto-trait check here.
        let this = self.clone();
        let instrument = instrument.clone();
        retry_with_backoff(
            &self.backoff,
            ScrapeError::is_retryable,
            async move |attempt| this.attempt(&instrument, attempt).await,
        )
        .await
    }
}

/// Parse scraped element text into an exact decimal, tolerating
/// thousands separators ("1,234.56" -> 1234.56). Failure is permanent:
/// non-numeric text means the page structure changed.
fn parse_price(symbol: &str, text: &str) -> Result<Decimal, ScrapeError> {
    let cleaned = text.trim().replace(',', "");
    Decimal::from_str(&cleaned).map_err(|_| ScrapeError::PriceParse {
        symbol: symbol.to_string(),
        text: cleaned,
    })
}
