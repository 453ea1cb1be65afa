//! Resilience Fabric — the shared circuit-breaker + connection-pool +
//! retry substrate used by every outbound dependency (PMS, ASR gRPC, TTS
//! HTTP, database, Redis, external APIs).
//!
//! `ResilienceFabric::execute` is the single entry point the rest of the
//! crate calls through; it composes a deadline, the retry policy, and a
//! per-`(dependency, kind)` circuit breaker.

pub mod circuit_breaker;
pub mod deadline;
pub mod pool;
pub mod retry;

mod fabric;

pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use deadline::{run_with_deadline, run_with_timeout};
pub use fabric::{OperationKind, ResilienceFabric};
pub use pool::{ConnectionPool, RoundRobinPool};
pub use retry::RetryPolicy;
