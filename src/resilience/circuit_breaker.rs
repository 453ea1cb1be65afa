//! Circuit breaker state machine
//!
//! One breaker guards one `(dependency, kind)` pair. State mutations are
//! serialized behind a `std::sync::Mutex` that is never held across an
//! `.await` point.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::BreakerProfile;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of a breaker, suitable for health reporting and
/// distributed-state replication.
#[derive(Debug, Clone)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub total_req: u64,
    pub total_fail: u64,
    pub total_succ: u64,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u64,
    last_failure_at: Option<DateTime<Utc>>,
    opened_at: Option<Instant>,
    next_attempt_at: Option<DateTime<Utc>>,
    half_open_probe_in_flight: bool,
    total_req: u64,
    total_fail: u64,
    total_succ: u64,
}

/// A named circuit breaker over one dependency/kind pair.
///
/// `closed -> open` when `failure_count` reaches `profile.failure_threshold`
/// consecutive failures. `open -> half_open` once `recovery_timeout` has
/// elapsed since the breaker opened; exactly one probe is admitted while
/// half-open. `half_open -> closed` on that probe's success, `half_open ->
/// open` on its failure.
pub struct CircuitBreaker {
    name: String,
    profile: BreakerProfile,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, profile: BreakerProfile) -> Self {
        Self {
            name: name.into(),
            profile,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
                opened_at: None,
                next_attempt_at: None,
                half_open_probe_in_flight: false,
                total_req: 0,
                total_fail: 0,
                total_succ: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admission check. Returns `Ok(())` when the call may proceed, or
    /// `Err(Error::CircuitOpen { .. })` when it must fail fast.
    ///
    /// Transitions `open -> half_open` here when `recovery_timeout` has
    /// elapsed, admitting exactly one probe; concurrent callers that lose
    /// the race to claim the probe slot are still rejected.
    pub fn before_call(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.total_req += 1;

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    Err(self.circuit_open_error(&inner))
                } else {
                    inner.half_open_probe_in_flight = true;
                    Ok(())
                }
            }
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.profile.recovery_timeout() {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_probe_in_flight = true;
                    tracing::info!(breaker = %self.name, "circuit breaker half-open, admitting probe");
                    Ok(())
                } else {
                    Err(self.circuit_open_error(&inner))
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_succ += 1;
        inner.success_count += 1;

        match inner.state {
            CircuitState::HalfOpen => {
                tracing::info!(breaker = %self.name, "circuit breaker closed after successful probe");
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.opened_at = None;
                inner.next_attempt_at = None;
                inner.half_open_probe_in_flight = false;
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::Open => {
                // A success observed while open (e.g. a stale in-flight call
                // racing the open transition) does not reopen the breaker.
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_fail += 1;
        inner.last_failure_at = Some(Utc::now());

        match inner.state {
            CircuitState::HalfOpen => {
                tracing::warn!(breaker = %self.name, "circuit breaker probe failed, reopening");
                self.open(&mut inner);
            }
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.profile.failure_threshold {
                    tracing::warn!(
                        breaker = %self.name,
                        failure_count = inner.failure_count,
                        threshold = self.profile.failure_threshold,
                        "circuit breaker tripped"
                    );
                    self.open(&mut inner);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn open(&self, inner: &mut Inner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.half_open_probe_in_flight = false;
        inner.next_attempt_at = Some(Utc::now() + self.profile.recovery_timeout());
    }

    fn circuit_open_error(&self, inner: &Inner) -> Error {
        let next_attempt_at = inner
            .next_attempt_at
            .unwrap_or_else(|| Utc::now() + self.profile.recovery_timeout());
        Error::circuit_open(next_attempt_at)
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock().unwrap();
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_at: inner.last_failure_at,
            next_attempt_at: inner.next_attempt_at,
            total_req: inner.total_req,
            total_fail: inner.total_fail,
            total_succ: inner.total_succ,
        }
    }

    pub fn is_healthy(&self) -> bool {
        !matches!(self.inner.lock().unwrap().state, CircuitState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(threshold: u32, recovery_secs: u64) -> BreakerProfile {
        BreakerProfile {
            failure_threshold: threshold,
            recovery_timeout_secs: recovery_secs,
            ..BreakerProfile::default()
        }
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new("pms", profile(5, 60));
        for _ in 0..4 {
            breaker.before_call().unwrap();
            breaker.record_failure();
        }
        assert_eq!(breaker.snapshot().state, CircuitState::Closed);

        breaker.before_call().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.snapshot().state, CircuitState::Open);
    }

    #[test]
    fn open_breaker_fails_fast() {
        let breaker = CircuitBreaker::new("pms", profile(1, 3600));
        breaker.before_call().unwrap();
        breaker.record_failure();

        let err = breaker.before_call().unwrap_err();
        assert!(matches!(err, Error::CircuitOpen { .. }));
    }

    #[test]
    fn success_resets_failure_count_while_closed() {
        let breaker = CircuitBreaker::new("pms", profile(3, 60));
        breaker.before_call().unwrap();
        breaker.record_failure();
        breaker.before_call().unwrap();
        breaker.record_success();
        // failure streak reset, two more failures should not trip a threshold-3 breaker
        breaker.before_call().unwrap();
        breaker.record_failure();
        breaker.before_call().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.snapshot().state, CircuitState::Closed);
    }

    #[test]
    fn half_open_admits_exactly_one_probe() {
        let breaker = CircuitBreaker::new("pms", profile(1, 0));
        breaker.before_call().unwrap();
        breaker.record_failure();

        // recovery_timeout_secs = 0, so the very next call transitions to half-open
        assert!(breaker.before_call().is_ok());
        // a second concurrent caller is rejected while the probe is in flight
        assert!(breaker.before_call().is_err());
    }

    #[test]
    fn half_open_probe_success_closes_breaker() {
        let breaker = CircuitBreaker::new("pms", profile(1, 0));
        breaker.before_call().unwrap();
        breaker.record_failure();

        breaker.before_call().unwrap();
        breaker.record_success();
        assert_eq!(breaker.snapshot().state, CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens_breaker() {
        let breaker = CircuitBreaker::new("pms", profile(1, 0));
        breaker.before_call().unwrap();
        breaker.record_failure();

        breaker.before_call().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.snapshot().state, CircuitState::Open);
    }

    #[test]
    fn is_healthy_reflects_state() {
        let breaker = CircuitBreaker::new("pms", profile(1, 3600));
        assert!(breaker.is_healthy());
        breaker.before_call().unwrap();
        breaker.record_failure();
        assert!(!breaker.is_healthy());
    }
}
