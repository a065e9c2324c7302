//! Scrape fault taxonomy.
//!
//! The retry policy only needs one bit from an error: transient or
//! permanent. Session startup failures and browser transport faults
//! are environment problems that a fresh attempt may fix; a price
//! that does not parse means the page structure changed and retrying
//! cannot help.

use std::time::Duration;

use fantoccini::error::{CmdError, NewSessionError};

/// A fault raised while scraping one instrument's quote.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The WebDriver session could not be started (driver or service
    /// unavailable). An environment fault, not a per-instrument bug.
    #[error("browser session could not be started: {0}")]
    SessionInit(#[from] NewSessionError),

    /// The awaited element never appeared within the timeout.
    #[error("timed out after {timeout:?} waiting for element {selector:?}")]
    ElementTimeout {
        /// CSS selector that was polled for.
        selector: String,
        /// How long the poll ran before giving up.
        timeout: Duration,
    },

    /// A navigation or browser-control command failed in transit.
    #[error("browser command failed: {0}")]
    WebDriver(#[source] CmdError),

    /// The price element's text was not a decimal number. Permanent:
    /// the page structure has changed.
    #[error("price text {text:?} for {symbol} did not parse as a decimal")]
    PriceParse {
        /// Symbol whose quote page produced the text.
        symbol: String,
        /// Raw element text after separator stripping.
        text: String,
    },
}

impl ScrapeError {
    /// Whether a fresh attempt against a fresh session may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SessionInit(_)
            | Self::ElementTimeout { .. }
            | Self::WebDriver(_) => true,
            Self::PriceParse { .. } => false,
        }
    }

    /// Classify a raw WebDriver command error, turning wait timeouts
    /// into [`ScrapeError::ElementTimeout`].
    pub(crate) fn from_cmd(
        err: CmdError,
        selector: &str,
        timeout: Duration,
    ) -> Self {
        match err {
            CmdError::WaitTimeout => Self::ElementTimeout {
                selector: selector.to_string(),
                timeout,
            },
            other => Self::WebDriver(other),
        }
    }
}
