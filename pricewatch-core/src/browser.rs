//! Scoped ownership of one WebDriver-controlled page visit.
//!
//! A [`BrowserSession`] is single-use: the scraper opens a fresh one
//! per attempt, drives it through navigate / consent / read, and tears
//! it down on every exit path. Sessions that errored are never reused;
//! half-broken page state (cookies, current URL) is not worth
//! salvaging.

use std::time::Duration;

use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ScrapeError;

/// Number of embedded frames that fingerprints the consent widget.
/// The quote page nests its cookie overlay inside the last of exactly
/// four iframes; any other count means "no consent dialog" and the
/// dismissal is skipped. Brittle, but reproduced from the live page.
const CONSENT_FRAME_COUNT: usize = 4;

/// XPath of the accept control inside the consent frame.
const CONSENT_ACCEPT_BUTTON: &str = "//button[text()='Accept Cookies']";

/// How long to poll for the consent accept button.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the browser side of a session is set up.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// WebDriver endpoint (geckodriver) to connect to.
    pub webdriver_url: Url,
    /// Whether firefox runs headless.
    pub headless: bool,
}

/// One live WebDriver session. Obtain with [`BrowserSession::open`],
/// release with [`BrowserSession::close`].
pub struct BrowserSession {
    client: Client,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("client", &"fantoccini::Client")
            .finish()
    }
}

impl BrowserSession {
    /// Start a fresh browser session against the configured WebDriver
    /// endpoint. Failure here is an environment fault
    /// ([`ScrapeError::SessionInit`]), always retryable.
    pub async fn open(config: &BrowserConfig) -> Result<Self, ScrapeError> {
        let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage"];
        if config.headless {
            args.push("-headless");
        }

        let mut capabilities = serde_json::map::Map::new();
        capabilities
            .insert("moz:firefoxOptions".to_string(), json!({ "args": args }));

        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(config.webdriver_url.as_str())
            .await?;
        debug!(webdriver = %config.webdriver_url, "browser session started");

        Ok(Self { client })
    }

    /// Navigate the session's page to `url`.
    pub async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        self.client
            .goto(url)
            .await
            .map_err(ScrapeError::WebDriver)?;
        debug!(%url, "opened quote page");
        Ok(())
    }

    /// Best-effort cookie-consent dismissal. Only acts when the page
    /// shows the known consent fingerprint; every failure in here is
    /// logged and swallowed, since consent handling is advisory and a
    /// quote may well be readable without it.
    pub async fn dismiss_consent_if_present(&mut self) {
        match self.try_dismiss_consent().await {
            Ok(true) => info!("accepted cookie consent"),
            Ok(false) => {}
            Err(err) => {
                warn!(error = %err, "could not dismiss cookie consent");
            }
        }
    }

    async fn try_dismiss_consent(
        &mut self,
    ) -> Result<bool, fantoccini::error::CmdError> {
        let frames = self.client.find_all(Locator::Css("iframe")).await?;
        debug!(frames = frames.len(), "inspected embedded frames");
        if frames.len() != CONSENT_FRAME_COUNT {
            return Ok(false);
        }

        // The consent widget lives in the last frame.
        let index = (CONSENT_FRAME_COUNT - 1) as u16;
        self.client.clone().enter_frame(Some(index)).await?;
        let button = self
            .client
            .wait()
            .at_most(CONSENT_TIMEOUT)
            .for_element(Locator::XPath(CONSENT_ACCEPT_BUTTON))
            .await?;
        button.click().await?;
        self.client.clone().enter_parent_frame().await?;
        Ok(true)
    }

    /// Poll until the element matching `selector` is present and
    /// return its text. Expiry is [`ScrapeError::ElementTimeout`].
    pub async fn wait_for_text(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<String, ScrapeError> {
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|err| ScrapeError::from_cmd(err, selector, timeout))?;

        element
            .text()
            .await
            .map_err(|err| ScrapeError::from_cmd(err, selector, timeout))
    }

    /// Tear the session down. Invoked on every exit path of a scrape
    /// attempt; teardown failure is logged, never propagated.
    pub async fn close(self) {
        if let Err(err) = self.client.close().await {
            warn!(error = %err, "browser session teardown failed");
        }
    }
}
