//! Bounded retry with exponential backoff.
//!
//! Pure policy: no knowledge of browsers, prices or HTTP. The caller
//! supplies the operation and a predicate deciding which of its errors
//! are worth another attempt.

use std::time::Duration;

use tracing::warn;

/// Backoff schedule for a bounded sequence of attempts.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for Backoff {
    /// Three attempts with 4s/8s pauses, capped at 10s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl Backoff {
    /// Delay to sleep after the given failed attempt (1-based):
    /// `min(max_delay, base_delay * 2^(attempt - 1))`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let scaled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exp));
        scaled.min(self.max_delay)
    }
}

/// Terminal outcome of a retried operation that never succeeded.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a retryable error; carries
    /// the last cause.
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        source: E,
    },

    /// A non-retryable error surfaced; no further attempts were made.
    #[error(transparent)]
    Fatal(E),
}

impl<E> RetryError<E> {
    /// The underlying cause, regardless of how retrying ended.
    pub fn into_source(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::Fatal(source) => source,
        }
    }
}

/// Run `op` until it succeeds, a non-retryable error surfaces, or the
/// attempt budget is spent. Sleeps between retryable failures per the
/// backoff schedule; never sleeps after the final failure or before a
/// fatal one.
pub async fn retry_with_backoff<T, E>(
    policy: &Backoff,
    is_retryable: impl Fn(&E) -> bool,
    mut op: impl AsyncFnMut(u32) -> Result<T, E>,
) -> Result<T, RetryError<E>>
where
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => {
                return Err(RetryError::Fatal(err));
            }
            Err(err) if attempt >= policy.max_attempts => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                });
            }
            Err(err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "attempt failed, backing off before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
