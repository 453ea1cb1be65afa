//! Cache entry envelope shared by the in-process and shared tiers.

use std::time::{Duration, Instant};

/// A cached value plus the bookkeeping the eviction policies and
/// invalidation paths need.
///
/// `created_at`/`accessed_at` use [`Instant`] rather than a wall-clock type
/// since entries never outlive the process they were created in (the shared
/// tier re-derives its own metadata hash independently, see
/// [`super::distributed::DistributedCache`]).
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub created_at: Instant,
    pub accessed_at: Instant,
    pub access_count: u64,
    pub ttl: Duration,
    pub size: usize,
    pub tags: Vec<String>,
}

impl<V> CacheEntry<V> {
    pub fn new(key: impl Into<String>, value: V, ttl: Duration, size: usize, tags: Vec<String>) -> Self {
        let now = Instant::now();
        Self {
            key: key.into(),
            value,
            created_at: now,
            accessed_at: now,
            access_count: 0,
            ttl,
            size,
            tags,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }

    pub fn touch(&mut self) {
        self.accessed_at = Instant::now();
        self.access_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_created_before_or_equal_accessed() {
        let entry = CacheEntry::new("k", 1, Duration::from_secs(60), 8, vec![]);
        assert!(entry.created_at <= entry.accessed_at);
    }

    #[test]
    fn expires_after_ttl_elapses() {
        let mut entry = CacheEntry::new("k", 1, Duration::from_millis(0), 8, vec![]);
        entry.created_at = Instant::now() - Duration::from_secs(1);
        assert!(entry.is_expired());
    }
}
