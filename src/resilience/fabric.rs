//! Resilience Fabric: the shared circuit-breaker + retry + deadline
//! substrate every outbound dependency call passes through.
//!
//! `execute()` wraps a caller-supplied effect with, in order: a deadline,
//! the retry policy, the circuit breaker, and metrics/log emission.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::FabricConfig;
use crate::error::Error;

use super::circuit_breaker::{CircuitBreaker, CircuitSnapshot};
use super::deadline::run_with_timeout;
use super::retry::RetryPolicy;

/// The category of outbound call, used to key a breaker alongside its
/// dependency name — one breaker per `(dependency, kind)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Connection,
    Query,
    Transaction,
    Rpc,
}

impl OperationKind {
    fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Connection => "connection",
            OperationKind::Query => "query",
            OperationKind::Transaction => "transaction",
            OperationKind::Rpc => "rpc",
        }
    }
}

/// Shared resilience substrate. Construct once per process and hand out
/// `Arc<ResilienceFabric>` clones to every module that makes outbound
/// calls (PMS, ASR, TTS, database, Redis).
pub struct ResilienceFabric {
    config: FabricConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl ResilienceFabric {
    pub fn new(config: FabricConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    fn breaker_for(&self, dependency: &str, kind: OperationKind) -> Arc<CircuitBreaker> {
        let key = format!("{dependency}:{}", kind.as_str());
        self.breakers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, self.config.profile_for(dependency))))
            .clone()
    }

    /// Execute `f` under the fabric's deadline, retry, and circuit-breaker
    /// protection for `dependency`/`kind`.
    ///
    /// `idempotent` must be `true` only for reads or mutations the caller
    /// has made safe to retry (an idempotency key was supplied, or the
    /// caller has set an explicit `retry=true` hint).
    pub async fn execute<F, Fut, T>(
        &self,
        dependency: &str,
        op_name: &str,
        kind: OperationKind,
        idempotent: bool,
        mut f: F,
    ) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let profile = self.config.profile_for(dependency);
        let breaker = self.breaker_for(dependency, kind);
        let retry = RetryPolicy::from_profile(&profile);
        let deadline = profile.deadline();

        let result = retry
            .run(idempotent, move || {
                let breaker = Arc::clone(&breaker);
                let fut = f();
                async move {
                    breaker.before_call()?;
                    let outcome = run_with_timeout(deadline, fut).await;
                    match &outcome {
                        Ok(_) => breaker.record_success(),
                        Err(_) => breaker.record_failure(),
                    }
                    outcome
                }
            })
            .await;

        match &result {
            Ok(_) => tracing::debug!(dependency, op_name, kind = kind.as_str(), "fabric call succeeded"),
            Err(err) => tracing::warn!(dependency, op_name, kind = kind.as_str(), error = %err, "fabric call failed"),
        }

        result
    }

    /// Run `f` exactly once with deadline and breaker protection, but no
    /// retries — for non-idempotent mutations.
    pub async fn execute_once<F, Fut, T>(
        &self,
        dependency: &str,
        op_name: &str,
        kind: OperationKind,
        f: F,
    ) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        self.execute(dependency, op_name, kind, false, f).await
    }

    /// Deadline for a named dependency, for callers that need to propagate
    /// it into a downstream transport (e.g. a gRPC call's own deadline).
    pub fn deadline_for(&self, dependency: &str) -> Duration {
        self.config.profile_for(dependency).deadline()
    }

    /// Health snapshots for all breakers that have handled at least one
    /// call, for the health endpoint.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        self.breakers.iter().map(|entry| entry.value().snapshot()).collect()
    }

    pub fn is_healthy(&self, dependency: &str, kind: OperationKind) -> bool {
        let key = format!("{dependency}:{}", kind.as_str());
        self.breakers
            .get(&key)
            .map(|b| b.is_healthy())
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerProfile;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fabric_with(threshold: u32) -> ResilienceFabric {
        let mut config = FabricConfig::default();
        config.default_profile = BreakerProfile {
            failure_threshold: threshold,
            recovery_timeout_secs: 3600,
            deadline_secs: 5,
            max_retries: 2,
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 5,
        };
        ResilienceFabric::new(config)
    }

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let fabric = fabric_with(5);
        let result = fabric
            .execute("pms", "get_availability", OperationKind::Rpc, true, || async { Ok::<_, Error>(1) })
            .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn retries_idempotent_transient_failures() {
        let fabric = fabric_with(5);
        let attempts = AtomicU32::new(0);
        let result = fabric
            .execute("pms", "get_availability", OperationKind::Rpc, true, || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err(Error::transient("network blip"))
                    } else {
                        Ok::<_, Error>("ok")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn opens_circuit_after_threshold_and_fails_fast() {
        let fabric = fabric_with(2);
        for _ in 0..2 {
            let _ = fabric
                .execute_once("pms", "op", OperationKind::Rpc, || async { Err::<(), _>(Error::transient("boom")) })
                .await;
        }

        let result = fabric
            .execute_once("pms", "op", OperationKind::Rpc, || async { Ok::<_, Error>(()) })
            .await;
        assert!(matches!(result, Err(Error::CircuitOpen { .. })));
        assert!(!fabric.is_healthy("pms", OperationKind::Rpc));
    }

    #[tokio::test]
    async fn validation_errors_never_retry() {
        let fabric = fabric_with(5);
        let attempts = AtomicU32::new(0);
        let result = fabric
            .execute("pms", "op", OperationKind::Rpc, true, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Error::ValidationError("bad".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_kinds_get_distinct_breakers() {
        let fabric = fabric_with(1);
        let _ = fabric
            .execute_once("db", "op", OperationKind::Connection, || async { Err::<(), _>(Error::transient("x")) })
            .await;
        assert!(!fabric.is_healthy("db", OperationKind::Connection));
        assert!(fabric.is_healthy("db", OperationKind::Query));
    }
}
