//! One fetch cycle: list, scrape each instrument, push successes.
//!
//! Per-instrument state machine: PENDING -> SCRAPING -> SUCCEEDED or
//! FAILED, then SUCCEEDED -> PUSHED or PUSH_FAILED. No instrument's
//! transition affects another's; the cycle itself never fails. The
//! scheduler only ever sees "cycle ran"; outcomes surface through
//! logs and the returned summary.

use tracing::{error, info, warn};

use crate::registry::InstrumentRegistry;
use crate::retry::RetryError;
use crate::scraper::QuoteSource;

/// Per-outcome counters for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Instruments in the registry snapshot.
    pub listed: usize,
    /// Scraped and pushed successfully.
    pub updated: usize,
    /// Scrape retries exhausted or a permanent scrape fault surfaced.
    pub scrape_failed: usize,
    /// Scraped fine, but the registry write was rejected or lost.
    pub push_failed: usize,
    /// Scraped fine, but the instrument carries no registry id.
    pub skipped_no_id: usize,
}

/// Drives one scheduled cycle over the registry and quote source.
#[derive(Debug)]
pub struct FetchOrchestrator<R, Q> {
    registry: R,
    quotes: Q,
}

impl<R, Q> FetchOrchestrator<R, Q>
where
    R: InstrumentRegistry,
    Q: QuoteSource,
{
    /// Wire an orchestrator over its two collaborators.
    pub fn new(registry: R, quotes: Q) -> Self {
        Self { registry, quotes }
    }

    /// Run one full cycle. Never fails: every per-instrument fault is
    /// converted to a log record here and the loop moves on.
    /// Instruments are processed in registry list order.
    pub async fn run_cycle(&self) -> CycleSummary {
        info!("fetching current prices");
        let instruments = self.registry.list().await;

        let mut summary = CycleSummary {
            listed: instruments.len(),
            ..CycleSummary::default()
        };

        for mut instrument in instruments {
            match self.quotes.fetch_quote(&instrument).await {
                Ok(price) => {
                    instrument.current_price = Some(price);

                    if !instrument.has_id() {
                        warn!(
                            name = %instrument.name,
                            symbol = %instrument.symbol,
                            "instrument has no registry id, skipping update"
                        );
                        summary.skipped_no_id += 1;
                        continue;
                    }

                    info!(
                        name = %instrument.name,
                        %price,
                        "updating instrument with scraped price"
                    );
                    match self.registry.update(&instrument).await {
                        Ok(()) => summary.updated += 1,
                        Err(err) => {
                            error!(
                                name = %instrument.name,
                                error = %err,
                                "failed to push price update"
                            );
                            summary.push_failed += 1;
                        }
                    }
                }
                Err(err) => {
                    let exhausted =
                        matches!(err, RetryError::Exhausted { .. });
                    error!(
                        name = %instrument.name,
                        symbol = %instrument.symbol,
                        retry_exhausted = exhausted,
                        error = %err,
                        "failed to scrape price"
                    );
                    summary.scrape_failed += 1;
                }
            }
        }

        info!(
            listed = summary.listed,
            updated = summary.updated,
            scrape_failed = summary.scrape_failed,
            push_failed = summary.push_failed,
            skipped_no_id = summary.skipped_no_id,
            "completed fetching current prices"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::registry::{MockInstrumentRegistry, RegistryError};
    use crate::scraper::MockQuoteSource;
    use pricewatch_model::Instrument;
    use reqwest::StatusCode;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::time::Duration;

    fn instrument(id: Option<i64>, name: &str, symbol: &str) -> Instrument {
        let mut instrument = Instrument::new(name, symbol);
        instrument.id = id;
        instrument
    }

    fn exhausted_timeout() -> RetryError<ScrapeError> {
        RetryError::Exhausted {
            attempts: 3,
            source: ScrapeError::ElementTimeout {
                selector: ".mod-ui-data-list__value".into(),
                timeout: Duration::from_secs(10),
            },
        }
    }

    #[tokio::test]
    async fn one_failing_instrument_does_not_block_the_batch() {
        // Registry returns A (always scrapes) and B (always times
        // out); expect exactly one update, for A, with the scraped
        // price as a decimal string.
        let mut registry = MockInstrumentRegistry::new();
        registry.expect_list().return_once(|| {
            vec![
                instrument(Some(1), "A", "A:NYQ:USD"),
                instrument(Some(2), "B", "B:NYQ:USD"),
            ]
        });
        registry
            .expect_update()
            .withf(|i| {
                i.id == Some(1)
                    && i.current_price
                        == Some(Decimal::from_str("100.50").unwrap())
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut quotes = MockQuoteSource::new();
        quotes.expect_fetch_quote().returning(|i| {
            if i.symbol == "A:NYQ:USD" {
                Ok(Decimal::from_str("100.50").unwrap())
            } else {
                Err(exhausted_timeout())
            }
        });

        let orchestrator = FetchOrchestrator::new(registry, quotes);
        let summary = orchestrator.run_cycle().await;

        assert_eq!(summary.listed, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.scrape_failed, 1);
        assert_eq!(summary.push_failed, 0);
    }

    #[tokio::test]
    async fn missing_id_is_never_updated_even_on_success() {
        let mut registry = MockInstrumentRegistry::new();
        registry
            .expect_list()
            .return_once(|| vec![instrument(None, "New", "NEW:GER:EUR")]);
        registry.expect_update().times(0);

        let mut quotes = MockQuoteSource::new();
        quotes
            .expect_fetch_quote()
            .returning(|_| Ok(Decimal::from_str("7.77").unwrap()));

        let orchestrator = FetchOrchestrator::new(registry, quotes);
        let summary = orchestrator.run_cycle().await;

        assert_eq!(summary.skipped_no_id, 1);
        assert_eq!(summary.updated, 0);
    }

    #[tokio::test]
    async fn rejected_push_is_isolated_too() {
        let mut registry = MockInstrumentRegistry::new();
        registry.expect_list().return_once(|| {
            vec![
                instrument(Some(1), "A", "A:NYQ:USD"),
                instrument(Some(2), "B", "B:NYQ:USD"),
            ]
        });
        registry
            .expect_update()
            .withf(|i| i.id == Some(1))
            .times(1)
            .returning(|_| {
                Err(RegistryError::UpdateRejected {
                    id: 1,
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "boom".into(),
                })
            });
        registry
            .expect_update()
            .withf(|i| i.id == Some(2))
            .times(1)
            .returning(|_| Ok(()));

        let mut quotes = MockQuoteSource::new();
        quotes
            .expect_fetch_quote()
            .returning(|_| Ok(Decimal::from_str("1.00").unwrap()));

        let orchestrator = FetchOrchestrator::new(registry, quotes);
        let summary = orchestrator.run_cycle().await;

        assert_eq!(summary.push_failed, 1);
        assert_eq!(summary.updated, 1);
    }

    #[tokio::test]
    async fn permanent_scrape_faults_count_like_exhaustion() {
        let mut registry = MockInstrumentRegistry::new();
        registry
            .expect_list()
            .return_once(|| vec![instrument(Some(3), "C", "C:NYQ:USD")]);
        registry.expect_update().times(0);

        let mut quotes = MockQuoteSource::new();
        quotes.expect_fetch_quote().returning(|_| {
            Err(RetryError::Fatal(ScrapeError::PriceParse {
                symbol: "C:NYQ:USD".into(),
                text: "--".into(),
            }))
        });

        let orchestrator = FetchOrchestrator::new(registry, quotes);
        let summary = orchestrator.run_cycle().await;

        assert_eq!(summary.scrape_failed, 1);
        assert_eq!(summary.updated, 0);
    }

    #[tokio::test]
    async fn empty_registry_snapshot_is_a_quiet_cycle() {
        let mut registry = MockInstrumentRegistry::new();
        registry.expect_list().return_once(Vec::new);

        let quotes = MockQuoteSource::new();

        let orchestrator = FetchOrchestrator::new(registry, quotes);
        let summary = orchestrator.run_cycle().await;

        assert_eq!(summary, CycleSummary::default());
    }
}
