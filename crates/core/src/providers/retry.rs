use log::warn;
use std::future::Future;
use std::time::Duration;

use crate::errors::CoreError;

/// Retry with linear backoff for quote fetches.
///
/// Only errors that report [`CoreError::is_retryable`] are retried;
/// everything else is returned on the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(250))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "{label} failed (attempt {attempt}/{}), retrying in {delay:?}: {e}",
                        self.max_retries + 1
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
