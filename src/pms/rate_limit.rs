//! Local outbound rate limiter for a PMS connector instance. Same
//! `governor` primitives the inbound middleware in
//! [`crate::middleware::governor`] uses, applied here to throttle
//! requests the orchestrator sends *to* the vendor rather than requests
//! received from clients.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{clock::DefaultClock, state::{InMemoryState, NotKeyed}, Quota, RateLimiter};

/// Blocks the caller until a permit is available, capping outbound request
/// rate to the configured `requests_per_second`.
pub struct OutboundRateLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl OutboundRateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second.max(1)).expect("max(1) is never zero");
        let quota = Quota::per_second(rps);
        Self { limiter: Arc::new(RateLimiter::direct(quota)) }
    }

    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn throttles_bursts_above_configured_rate() {
        let limiter = OutboundRateLimiter::new(5);
        let started = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert!(started.elapsed().as_millis() >= 900);
    }
}
