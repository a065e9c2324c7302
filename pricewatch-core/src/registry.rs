//! Typed client for the backend instrument registry.
//!
//! The registry is the system of record. A failed list is "nothing to
//! do this cycle"; a failed update leaves the registry stale until the
//! next cycle. Neither is ever fatal to the process.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, error, info, warn};
use url::Url;

use pricewatch_model::Instrument;

/// A registry interaction that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The request never produced a response.
    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The update endpoint rejected the write. Status and body are
    /// kept for diagnostics.
    #[error("registry rejected update for instrument {id} with {status}: {body}")]
    UpdateRejected {
        /// Registry id of the instrument whose update was rejected.
        id: i64,
        /// HTTP status of the rejection.
        status: StatusCode,
        /// Response body, verbatim.
        body: String,
    },

    /// The instrument carries no registry id; update requires a known
    /// identity.
    #[error("instrument {name:?} has no registry id, cannot update")]
    MissingId {
        /// Display name of the offending instrument.
        name: String,
    },

    /// The update URL could not be built from the configured base.
    #[error("could not build registry update URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Synchronizes instrument state with the remote registry. Seam
/// between the orchestrator and HTTP.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstrumentRegistry: Send + Sync {
    /// Fetch the current instrument snapshot. Transport failures and
    /// non-2xx responses are logged and collapse to an empty list.
    async fn list(&self) -> Vec<Instrument>;

    /// Push one instrument's state, keyed by its registry id.
    async fn update(&self, instrument: &Instrument) -> Result<(), RegistryError>;
}

/// HTTP implementation of [`InstrumentRegistry`] over a shared
/// `reqwest` client (safe for concurrent use across tasks).
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RegistryClient {
    /// Client for the registry rooted at `base_url`
    /// (`GET {base_url}`, `PUT {base_url}/{id}`).
    pub fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    async fn try_list(&self) -> Result<Vec<Instrument>, RegistryError> {
        let response = self
            .http
            .get(self.base_url.clone())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    fn update_url(&self, id: i64) -> Result<Url, url::ParseError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{id}"))
    }
}

#[async_trait]
impl InstrumentRegistry for RegistryClient {
    async fn list(&self) -> Vec<Instrument> {
        match self.try_list().await {
            Ok(instruments) => {
                debug!(count = instruments.len(), "listed instruments from registry");
                instruments
            }
            Err(err) => {
                error!(error = %err, "failed to list instruments from registry");
                Vec::new()
            }
        }
    }

    async fn update(&self, instrument: &Instrument) -> Result<(), RegistryError> {
        let Some(id) = instrument.id else {
            warn!(
                name = %instrument.name,
                "instrument has no registry id, skipping update"
            );
            return Err(RegistryError::MissingId {
                name: instrument.name.clone(),
            });
        };

        let response = self
            .http
            .put(self.update_url(id)?)
            .json(instrument)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::UpdateRejected { id, status, body });
        }

        info!(
            symbol = %instrument.symbol,
            price = ?instrument.current_price,
            "updated instrument in registry"
        );
        Ok(())
    }
}
