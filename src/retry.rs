//! # Retry with Exponential Backoff
//!
//! Wraps a fallible async operation with exponential backoff and jitter.
//! Used internally by the concrete [`crate::model::OpenAiCompatibleModel`]
//! backend for transient HTTP failures; exposed publicly so callers can apply
//! the same policy to their own tool implementations.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Backoff configuration for [`retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter fraction in `[0, 1]` applied to each computed delay.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt);
        let capped = exp.min(self.max_delay.as_millis() as u64);
        let jitter_range = (capped as f64 * self.jitter) as u64;
        let jittered = if jitter_range > 0 {
            let mut rng = rand::thread_rng();
            capped.saturating_add(rng.gen_range(0..=jitter_range))
        } else {
            capped
        };
        Duration::from_millis(jittered)
    }
}

/// Retry `op` until it succeeds, a non-retryable error is returned (per
/// `should_retry`), or `max_attempts` is exhausted.
pub async fn retry<F, Fut, T>(
    config: RetryConfig,
    should_retry: impl Fn(&crate::error::Error) -> bool,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < config.max_attempts && should_retry(&err) => {
                let delay = config.delay_for_attempt(attempt);
                log::debug!(
                    "retrying after error (attempt {}/{}): {err}",
                    attempt + 1,
                    config.max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Default retry predicate: retry transport failures and API errors, never
/// configuration, parsing, or lifecycle errors.
pub fn default_should_retry(err: &crate::error::Error) -> bool {
    matches!(
        err,
        crate::error::Error::Http(_) | crate::error::Error::Api(_) | crate::error::Error::Timeout
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let attempts = AtomicU32::new(0);
        let result = retry(
            RetryConfig::default().with_max_attempts(5).with_base_delay(Duration::from_millis(1)),
            default_should_retry,
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(crate::error::Error::api("transient"))
                } else {
                    Ok(42)
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_non_retryable() {
        let attempts = AtomicU32::new(0);
        let result: Result<i32> = retry(
            RetryConfig::default().with_base_delay(Duration::from_millis(1)),
            default_should_retry,
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(crate::error::Error::config("bad config"))
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausts_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<i32> = retry(
            RetryConfig::default().with_max_attempts(3).with_base_delay(Duration::from_millis(1)),
            default_should_retry,
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(crate::error::Error::timeout())
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
