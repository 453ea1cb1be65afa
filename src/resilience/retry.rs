//! Retry policy: exponential backoff with jitter over idempotent operations
//!
//! Only `Transient` and `RateLimited` errors are retried ([`Error::is_retriable`]);
//! `RateLimited` waits at least its carried `retry_after`. Non-idempotent
//! callers should never reach the retry loop — see [`RetryPolicy::run`].

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::config::BreakerProfile;
use crate::error::Error;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_profile(profile: &BreakerProfile) -> Self {
        Self {
            max_retries: profile.max_retries,
            base_delay: Duration::from_millis(profile.retry_base_delay_ms),
            max_delay: Duration::from_millis(profile.retry_max_delay_ms),
        }
    }

    /// Run `f`, retrying on retriable errors up to `max_retries` times.
    ///
    /// `idempotent` gates whether retries happen at all: mutations without
    /// an idempotency key must pass `false` and this degrades to a single
    /// attempt regardless of the error's classification.
    pub async fn run<F, Fut, T>(&self, idempotent: bool, mut f: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !idempotent || !err.is_retriable() || attempt >= self.max_retries {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt, &err);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying operation");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn delay_for(&self, attempt: u32, err: &Error) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = exponential.min(self.max_delay);
        let jittered = jitter(capped);

        if let Error::RateLimited { retry_after } = err {
            jittered.max(*retry_after)
        } else {
            jittered
        }
    }
}

/// Full jitter: a uniform random duration in `[0, upper]`.
fn jitter(upper: Duration) -> Duration {
    if upper.is_zero() {
        return upper;
    }
    let millis = upper.as_millis().max(1) as u64;
    let jittered_millis = rand::rng().random_range(0..=millis);
    Duration::from_millis(jittered_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();
        let result = policy(3)
            .run(true, || {
                let a = a.clone();
                async move {
                    a.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Error>(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();
        let result = policy(5)
            .run(true, || {
                let a = a.clone();
                async move {
                    let n = a.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(Error::transient("connection reset"))
                    } else {
                        Ok::<_, Error>("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_idempotent_calls() {
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();
        let result = policy(5)
            .run(false, || {
                let a = a.clone();
                async move {
                    a.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Error::transient("network blip"))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_validation_errors() {
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();
        let result = policy(5)
            .run(true, || {
                let a = a.clone();
                async move {
                    a.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Error::ValidationError("bad input".into()))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_last_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();
        let result = policy(2)
            .run(true, || {
                let a = a.clone();
                async move {
                    a.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Error::transient("always fails"))
                }
            })
            .await;
        assert!(result.is_err());
        // initial attempt + 2 retries = 3
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
