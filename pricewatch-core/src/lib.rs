//! Core logic for the pricewatch price-refresh service.
//!
//! One scheduled cycle flows through these modules in order: the
//! [`scheduler`] fires, the [`orchestrator`] lists instruments through
//! the [`registry`] client, the [`scraper`] drives a [`browser`]
//! session under the [`retry`] policy to read each quote, and
//! successful prices are pushed back through the registry client.
//! Per-instrument failures never escape the orchestrator.

pub mod browser;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod scraper;

pub use error::ScrapeError;
pub use orchestrator::{CycleSummary, FetchOrchestrator};
pub use registry::{InstrumentRegistry, RegistryClient, RegistryError};
pub use retry::{Backoff, RetryError};
pub use scheduler::{ScheduleError, Scheduler, Trigger};
pub use scraper::{FtQuoteScraper, QuoteSource};
