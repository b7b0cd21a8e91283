//! Exponential backoff shared by API calls and media downloads.

use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

/// What the caller's classifier wants done with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Retries after the first attempt; `0` disables retrying.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// No retries and no sleeping, for callers that want a single attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-indexed):
    /// `min(base * 2^retry, max) + jitter`, jitter drawn from `0..base`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = if base_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..base_ms))
        } else {
            Duration::ZERO
        };
        capped + jitter
    }
}

/// Run `operation` until it succeeds, the classifier aborts, or
/// `config.max_retries` retries have been spent. The last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    config: &RetryConfig,
    classifier: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if retry >= config.max_retries || classifier(&e) == RetryAction::Abort {
                    return Err(e);
                }
                let delay = config.delay_for_retry(retry);
                tracing::warn!(
                    "Retryable error (attempt {}/{}), retrying in {}ms: {}",
                    retry + 1,
                    config.max_retries + 1,
                    delay.as_millis(),
                    e
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
        }
    }
}
