//! Deadlines and cooperative cancellation
//!
//! Every fabric-wrapped call carries a deadline; expiry surfaces
//! [`Error::Timeout`], distinct from caller-initiated cancellation which
//! surfaces [`Error::Cancelled`].

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Runs `fut` to completion, a deadline, or a cancellation signal —
/// whichever comes first.
pub async fn run_with_deadline<F, T>(
    deadline: Duration,
    cancellation: &CancellationToken,
    fut: F,
) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::select! {
        biased;
        _ = cancellation.cancelled() => Err(Error::Cancelled),
        result = tokio::time::timeout(deadline, fut) => {
            result.unwrap_or(Err(Error::Timeout))
        }
    }
}

/// Runs `fut` against a deadline only, with no cancellation source.
/// Convenience for call sites that don't carry a cancellation token.
pub async fn run_with_timeout<F, T>(deadline: Duration, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_before_deadline() {
        let result = run_with_timeout(Duration::from_millis(50), async { Ok::<_, Error>(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn times_out_past_deadline() {
        let result = run_with_timeout(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, Error>(1)
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn cancellation_preempts_deadline() {
        let token = CancellationToken::new();
        token.cancel();
        let result = run_with_deadline(Duration::from_secs(5), &token, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, Error>(1)
        })
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn runs_normally_without_cancellation() {
        let token = CancellationToken::new();
        let result = run_with_deadline(Duration::from_millis(50), &token, async { Ok::<_, Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
