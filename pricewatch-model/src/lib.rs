//! Shared data models for the pricewatch service.
//!
//! The registry wire contract is camelCase JSON; prices travel as
//! decimal strings (never binary floats) so no precision is lost
//! between the scraper and the backend of record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A tracked financial instrument, as exchanged with the backend
/// registry.
///
/// Instruments are rebuilt from the registry's list response every
/// fetch cycle and discarded when the cycle ends; the registry is the
/// only persistent store. `current_price` is set in place by a
/// successful scrape within the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    /// Registry-assigned identifier. Absent for instruments that have
    /// not been registered yet; such instruments must never be
    /// submitted to the update endpoint.
    #[serde(default)]
    pub id: Option<i64>,
    /// Display label.
    pub name: String,
    /// Quote-source lookup key, e.g. an exchange-qualified ticker
    /// such as `QDVE:GER:EUR`.
    pub symbol: String,
    /// Optional classification tag.
    #[serde(default)]
    pub category: Option<String>,
    /// Optional currency code.
    #[serde(default)]
    pub base_currency: Option<String>,
    /// Latest known price; `None` until the first successful scrape.
    /// Serialized as a decimal string or `null`.
    #[serde(default)]
    pub current_price: Option<Decimal>,
    /// Optional source identifier, omitted from update bodies when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
}

impl Instrument {
    /// Build an instrument from its lookup key and label, without a
    /// registry identity or price.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            symbol: symbol.into(),
            category: None,
            base_currency: None,
            current_price: None,
            provider_name: None,
        }
    }

    /// Whether this instrument carries a registry identity and may be
    /// submitted to the update endpoint.
    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }
}
