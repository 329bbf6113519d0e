//! Retry policy layered on top of loaders
//!
//! The cache never retries by itself. Wrapping a loader with [`with_retry`]
//! gives it exponential backoff for transient failures before the error
//! reaches the cache entry.

use futures::future::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::client::Loader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure; zero disables retrying
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Wraps `loader` so retryable failures are attempted again per `policy`
pub fn with_retry<T: Send + 'static>(loader: Loader<T>, policy: RetryPolicy) -> Loader<T> {
    if policy.retries == 0 {
        return loader;
    }
    Arc::new(move || {
        let loader = Arc::clone(&loader);
        let policy = policy.clone();
        async move {
            let mut attempt = 0;
            loop {
                match loader().await {
                    Err(err) if err.is_retryable() && attempt < policy.retries => {
                        let delay = policy.delay_for(attempt);
                        debug!(attempt = attempt + 1, ?delay, error = %err, "retrying loader");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    result => return result,
                }
            }
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{loader, LoaderError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(calls: Arc<AtomicU32>, failures: u32, error: LoaderError) -> Loader<u32> {
        loader(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let error = error.clone();
            async move {
                if n < failures {
                    Err(error)
                } else {
                    Ok(n)
                }
            }
        })
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let l = with_retry(
            flaky(Arc::clone(&calls), 2, LoaderError::Request("reset".into())),
            RetryPolicy::default(),
        );
        assert_eq!(l().await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let l = with_retry(
            flaky(Arc::clone(&calls), 10, LoaderError::Status { status: 503 }),
            RetryPolicy::default(),
        );
        assert_eq!(l().await, Err(LoaderError::Status { status: 503 }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let l = with_retry(
            flaky(Arc::clone(&calls), 10, LoaderError::Status { status: 404 }),
            RetryPolicy::default(),
        );
        assert!(l().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_policy_passes_through() {
        let calls = Arc::new(AtomicU32::new(0));
        let l = with_retry(
            flaky(Arc::clone(&calls), 1, LoaderError::Request("down".into())),
            RetryPolicy::none(),
        );
        assert!(l().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
