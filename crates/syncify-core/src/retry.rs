//! Retry with exponential backoff
//!
//! A [`RetryPolicy`] bounds the number of attempts of a catalog call and
//! decides from the error whether another attempt is worthwhile. The delay
//! before retry `n` (zero-based) is `min(base_delay * 2^n, max_delay)`.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::catalog::{CatalogError, CatalogResult};
use crate::error::ErrorKind;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    GiveUp,
}

/// Bounded retry policy for catalog calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub classify: fn(&CatalogError) -> RetryDecision,
}

fn retry_unless_permanent(error: &CatalogError) -> RetryDecision {
    match error.kind() {
        ErrorKind::Auth | ErrorKind::NotFound | ErrorKind::Conflict => RetryDecision::GiveUp,
        _ => RetryDecision::Retry,
    }
}

fn retry_stale_only(error: &CatalogError) -> RetryDecision {
    match error {
        CatalogError::StaleToken => RetryDecision::Retry,
        _ => RetryDecision::GiveUp,
    }
}

impl RetryPolicy {
    /// Policy for destination searches: 2 attempts, 1 s base, 5 s cap
    pub fn search() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            classify: retry_unless_permanent,
        }
    }

    /// Policy for mutations rejected with a stale version token
    pub fn stale_token() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(500),
            classify: retry_stale_only,
        }
    }

    /// Same policy with different delays
    pub fn with_delays(self, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            ..self
        }
    }

    /// Delay before the retry following failed attempt `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether a failure of attempt `attempt` (zero-based) should be retried
    pub fn should_retry(&self, attempt: u32, error: &CatalogError) -> bool {
        attempt + 1 < self.max_attempts && (self.classify)(error) == RetryDecision::Retry
    }

    /// Run `op` until it succeeds, fails permanently or runs out of attempts
    pub async fn run<T, F, Fut>(&self, context: &str, mut op: F) -> CatalogResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CatalogResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(attempt, &e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        context,
                        attempt + 1,
                        self.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::search();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[test]
    fn test_classification() {
        let search = RetryPolicy::search();
        assert!(search.should_retry(0, &CatalogError::RateLimited));
        assert!(!search.should_retry(1, &CatalogError::RateLimited));
        assert!(!search.should_retry(0, &CatalogError::Auth("401".into())));

        let stale = RetryPolicy::stale_token();
        assert!(stale.should_retry(0, &CatalogError::StaleToken));
        assert!(!stale.should_retry(1, &CatalogError::StaleToken));
        assert!(!stale.should_retry(0, &CatalogError::Conflict("dupe".into())));
    }

    #[tokio::test]
    async fn test_run_stops_after_max_attempts() {
        let policy = RetryPolicy::search().with_delays(Duration::ZERO, Duration::ZERO);
        let calls = &AtomicU32::new(0);

        let result: CatalogResult<()> = policy
            .run("search", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CatalogError::RateLimited)
            })
            .await;

        assert!(matches!(result, Err(CatalogError::RateLimited)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_returns_first_success() {
        let policy = RetryPolicy::search().with_delays(Duration::ZERO, Duration::ZERO);
        let calls = &AtomicU32::new(0);

        let result = policy
            .run("search", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(CatalogError::Http {
                        status: 500,
                        message: "boom".into(),
                    })
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_auth() {
        let policy = RetryPolicy::search().with_delays(Duration::ZERO, Duration::ZERO);
        let calls = &AtomicU32::new(0);

        let result: CatalogResult<()> = policy
            .run("search", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CatalogError::Auth("expired".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
