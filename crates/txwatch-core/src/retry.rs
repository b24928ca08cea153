//! Exponential backoff retry for per-block fetches.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::IndexerError;

/// Configuration for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff unit; the delay after the n-th failed attempt is `2^n` units.
    pub base_delay: Duration,
    /// Optional ceiling on a single delay. Unset means pure doubling.
    pub max_backoff: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_backoff: None,
        }
    }
}

/// Stateless retry policy. Computes the next delay given the attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay after the `attempt`-th failure (1-based), or `None`
    /// if that was the last permitted attempt.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.config.max_attempts {
            return None;
        }
        let delay = 2u32
            .checked_pow(attempt)
            .and_then(|factor| self.config.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);
        Some(match self.config.max_backoff {
            Some(cap) => delay.min(cap),
            None => delay,
        })
    }

    /// Run `op` for `block_number` until it succeeds or attempts run out.
    ///
    /// Cancellation wins over everything: a pending call or backoff sleep is
    /// abandoned and `IndexerError::Cancelled` is returned. Non-retryable
    /// errors end the loop at once. Exhaustion yields
    /// `IndexerError::RetriesExhausted` wrapping the last error.
    pub async fn run<T, F, Fut>(
        &self,
        block_number: u64,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, IndexerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexerError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IndexerError::Cancelled),
                result = op() => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => e,
            };

            let delay = if err.is_retryable() {
                self.next_delay(attempt)
            } else {
                None
            };

            match delay {
                Some(delay) => {
                    tracing::warn!(
                        block = block_number,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "block fetch failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(IndexerError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    tracing::error!(
                        block = block_number,
                        attempt,
                        error = %err,
                        "block fetch failed permanently"
                    );
                    return Err(IndexerError::RetriesExhausted {
                        block_number,
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
            }
        }
    }
}
