//! Round-robin gRPC channel pool for the ASR Proxy's upstream connection.
//!
//! `N` lazily-connected channels (default 5, see [`crate::config::AsrConfig`])
//! selected round-robin via [`crate::resilience::pool::RoundRobinPool`]. A
//! channel marked unhealthy after an RPC failure is reopened lazily the next
//! time its slot comes up in rotation; `tonic`'s `connect_lazy` means this
//! never blocks on a real connection attempt.

use std::sync::Mutex;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

use crate::error::Error;
use crate::resilience::pool::RoundRobinPool;

struct Slot {
    channel: Channel,
    healthy: bool,
}

pub struct AsrChannelPool {
    endpoint: Endpoint,
    slots: Vec<Mutex<Slot>>,
    order: RoundRobinPool<usize>,
}

impl AsrChannelPool {
    pub fn new(server: &str, port: u16, pool_size: usize) -> Result<Self, Error> {
        let uri = format!("http://{server}:{port}");
        let endpoint = Channel::from_shared(uri)
            .map_err(|e| Error::ValidationError(format!("invalid ASR endpoint: {e}")))?
            .connect_timeout(Duration::from_secs(5));

        let size = pool_size.max(1);
        let slots = (0..size)
            .map(|_| {
                Mutex::new(Slot {
                    channel: endpoint.connect_lazy(),
                    healthy: true,
                })
            })
            .collect();

        Ok(Self {
            endpoint,
            slots,
            order: RoundRobinPool::new((0..size).collect()),
        })
    }

    /// Acquire the next channel in rotation, reopening its slot first if it
    /// was marked unhealthy by a prior caller. Returns the slot index
    /// alongside the channel so callers can report failure back to it.
    pub fn acquire(&self) -> (usize, Channel) {
        let idx = *self.order.next();
        let mut slot = self.slots[idx].lock().unwrap();
        if !slot.healthy {
            slot.channel = self.endpoint.connect_lazy();
            slot.healthy = true;
        }
        (idx, slot.channel.clone())
    }

    pub fn report_failure(&self, idx: usize) {
        self.slots[idx].lock().unwrap().healthy = false;
    }

    /// Healthy if at least one channel in the pool is marked healthy.
    pub fn is_healthy(&self) -> bool {
        self.slots.iter().any(|s| s.lock().unwrap().healthy)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_across_all_slots() {
        let pool = AsrChannelPool::new("localhost", 50051, 3).unwrap();
        let picks: Vec<usize> = (0..6).map(|_| pool.acquire().0).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn healthy_with_at_least_one_good_slot() {
        let pool = AsrChannelPool::new("localhost", 50051, 2).unwrap();
        assert!(pool.is_healthy());
        pool.report_failure(0);
        assert!(pool.is_healthy());
        pool.report_failure(1);
        assert!(!pool.is_healthy());
    }

    #[test]
    fn unhealthy_slot_reopens_on_next_acquire() {
        let pool = AsrChannelPool::new("localhost", 50051, 1).unwrap();
        pool.report_failure(0);
        assert!(!pool.is_healthy());
        let _ = pool.acquire();
        assert!(pool.is_healthy());
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let result = AsrChannelPool::new("\0bad", 1, 1);
        assert!(result.is_err());
    }
}
