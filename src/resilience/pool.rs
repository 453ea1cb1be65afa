//! Connection pool contract and the round-robin channel selector
//!
//! Two concrete pools are built on top of these primitives: the SQL pool
//! (min/max size, idle recycle, health ping before checkout — delegated to
//! `sqlx`'s own pool) and the ASR gRPC channel pool (`crate::asr::channel_pool`),
//! which is `N` parallel channels selected round-robin.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::Error;

/// A leased connection, released back to its pool when dropped or via an
/// explicit call, per the "lease must be released on all exit paths" rule.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    type Conn: Send;

    /// Acquire a connection, failing with [`Error::Timeout`] if none becomes
    /// available within `deadline`.
    async fn acquire(&self, deadline: Duration) -> Result<Self::Conn, Error>;

    /// Return a connection to the pool.
    async fn release(&self, conn: Self::Conn);

    /// Pool-wide health: true if at least one connection is usable.
    async fn is_healthy(&self) -> bool;
}

/// Round-robin selection over a fixed set of items, guarded by a mutex that
/// holds only the index — never the item itself, and never across an I/O
/// suspension point.
pub struct RoundRobinPool<T> {
    items: Vec<T>,
    next: Mutex<usize>,
}

impl<T> RoundRobinPool<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            next: Mutex::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Select the next item in round-robin order. Panics if the pool is empty.
    pub fn next(&self) -> &T {
        let mut idx = self.next.lock().unwrap();
        let item = &self.items[*idx];
        *idx = (*idx + 1) % self.items.len();
        item
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robins_across_all_items() {
        let pool = RoundRobinPool::new(vec!["a", "b", "c"]);
        let picks: Vec<&str> = (0..6).map(|_| *pool.next()).collect();
        assert_eq!(picks, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn single_item_pool_always_returns_it() {
        let pool = RoundRobinPool::new(vec![42]);
        assert_eq!(*pool.next(), 42);
        assert_eq!(*pool.next(), 42);
    }
}
