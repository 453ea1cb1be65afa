//! Single-flight coordination: concurrent callers requesting the same key
//! while a value is being computed share one upstream call and one result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::error::Error;

/// Coordinates concurrent misses for the same key so the populating
/// function runs at most once per key at a time.
///
/// Waiters that arrive after the in-flight call fails all receive the same
/// error (wrapped in `Arc` since `Error` itself does not implement `Clone`).
pub struct SingleFlight<V> {
    inflight: Mutex<HashMap<String, Arc<OnceCell<Result<V, Arc<Error>>>>>>,
}

impl<V: Clone> SingleFlight<V> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` for `key`, joining any call already in flight for the same
    /// key instead of invoking `f` again.
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> Result<V, Arc<Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>>,
    {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell
            .get_or_init(|| async move { f().await.map_err(Arc::new) })
            .await
            .clone();

        // Best-effort cleanup: only drop the slot once no other waiter still
        // holds a clone of it. A caller arriving in the narrow window
        // between this check and the removal simply starts a fresh flight,
        // which is correct, just not maximally deduplicated.
        {
            let mut inflight = self.inflight.lock().await;
            if let Some(existing) = inflight.get(key) {
                if Arc::strong_count(existing) <= 2 {
                    inflight.remove(key);
                }
            }
        }

        result
    }
}

impl<V: Clone> Default for SingleFlight<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_misses_invoke_upstream_once() {
        let flight: SingleFlight<String> = SingleFlight::new();
        let calls = Arc::new(AtomicU32::new(0));

        let run_one = |flight: &SingleFlight<String>, calls: Arc<AtomicU32>| async move {
            flight
                .run("welcome", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok("audio-bytes".to_string())
                })
                .await
        };

        let (a, b) = tokio::join!(run_one(&flight, calls.clone()), run_one(&flight, calls.clone()));
        assert_eq!(a.unwrap(), "audio-bytes");
        assert_eq!(b.unwrap(), "audio-bytes");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_inflight_call_is_shared_by_all_waiters() {
        let flight: SingleFlight<String> = SingleFlight::new();

        let run_one = |flight: &SingleFlight<String>| async move {
            flight
                .run("bad-key", || async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Err(Error::transient("upstream down"))
                })
                .await
        };

        let (a, b) = tokio::join!(run_one(&flight), run_one(&flight));
        assert!(a.is_err());
        assert!(b.is_err());
    }
}
