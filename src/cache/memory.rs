//! In-process cache tier: bounded by entry count and byte size, with a
//! pluggable eviction policy.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::Error;

use super::entry::CacheEntry;

/// Eviction policy for the in-process tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Evict the least-recently-accessed entry.
    Lru,
    /// Evict the least-frequently-accessed entry.
    Lfu,
    /// Evict the entry closest to expiry.
    Ttl,
    /// Evict the oldest-inserted entry.
    Fifo,
}

impl FromStr for EvictionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "lfu" => Ok(Self::Lfu),
            "ttl" => Ok(Self::Ttl),
            "fifo" => Ok(Self::Fifo),
            other => Err(Error::ValidationError(format!(
                "unknown eviction policy '{other}', expected one of lru, lfu, ttl, fifo"
            ))),
        }
    }
}

struct Slot<V> {
    entry: CacheEntry<V>,
    inserted_seq: u64,
}

/// Bounded in-process cache tier.
///
/// Eviction runs a linear scan of the current entries to find the
/// policy-preferred victim. This is not the O(1) access-order list an
/// intrusive linked-hash-map would give, but the pack carries no crate for
/// that structure and this tier is sized for a single tenant's hot set, not
/// millions of entries, so a scan per eviction is an acceptable trade.
pub struct MemoryTier<V> {
    entries: HashMap<String, Slot<V>>,
    policy: EvictionPolicy,
    max_entries: usize,
    max_bytes: usize,
    current_bytes: usize,
    next_seq: u64,
}

impl<V: Clone> MemoryTier<V> {
    pub fn new(policy: EvictionPolicy, max_entries: usize, max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
            max_entries,
            max_bytes,
            current_bytes: 0,
            next_seq: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = self.entries.get(key).map(|slot| slot.entry.is_expired()).unwrap_or(false);
        if expired {
            self.remove(key);
            return None;
        }
        let slot = self.entries.get_mut(key)?;
        slot.entry.touch();
        Some(slot.entry.value.clone())
    }

    pub fn peek_entry(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: std::time::Duration, size: usize, tags: Vec<String>) {
        let key = key.into();
        if let Some(old) = self.entries.remove(&key) {
            self.current_bytes = self.current_bytes.saturating_sub(old.entry.size);
        }

        while self.max_entries > 0 && self.entries.len() >= self.max_entries {
            if !self.evict_one() {
                break;
            }
        }
        while self.max_bytes > 0 && self.current_bytes + size > self.max_bytes {
            if !self.evict_one() {
                break;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.current_bytes += size;
        self.entries.insert(
            key.clone(),
            Slot {
                entry: CacheEntry::new(key, value, ttl, size, tags),
                inserted_seq: seq,
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> bool {
        if let Some(slot) = self.entries.remove(key) {
            self.current_bytes = self.current_bytes.saturating_sub(slot.entry.size);
            true
        } else {
            false
        }
    }

    /// Remove every entry carrying `tag`. Tag invalidation is in-process
    /// only; the shared tier supports exact-key and glob invalidation.
    pub fn invalidate_tag(&mut self, tag: &str) -> usize {
        let victims: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.tags.iter().any(|t| t == tag))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &victims {
            self.remove(key);
        }
        victims.len()
    }

    pub fn purge_expired(&mut self) -> usize {
        let victims: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &victims {
            self.remove(key);
        }
        victims.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_bytes(&self) -> usize {
        self.current_bytes
    }

    fn evict_one(&mut self) -> bool {
        let victim = match self.policy {
            EvictionPolicy::Lru => self
                .entries
                .iter()
                .min_by_key(|(_, s)| s.entry.accessed_at)
                .map(|(k, _)| k.clone()),
            EvictionPolicy::Lfu => self
                .entries
                .iter()
                .min_by_key(|(_, s)| s.entry.access_count)
                .map(|(k, _)| k.clone()),
            EvictionPolicy::Ttl => self
                .entries
                .iter()
                .min_by_key(|(_, s)| s.entry.created_at + s.entry.ttl)
                .map(|(k, _)| k.clone()),
            EvictionPolicy::Fifo => self
                .entries
                .iter()
                .min_by_key(|(_, s)| s.inserted_seq)
                .map(|(k, _)| k.clone()),
        };

        match victim {
            Some(key) => {
                self.remove(&key);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_known_policies() {
        assert_eq!(EvictionPolicy::from_str("LRU").unwrap(), EvictionPolicy::Lru);
        assert_eq!(EvictionPolicy::from_str("fifo").unwrap(), EvictionPolicy::Fifo);
        assert!(EvictionPolicy::from_str("bogus").is_err());
    }

    #[test]
    fn evicts_least_recently_used_when_over_capacity() {
        let mut tier: MemoryTier<i32> = MemoryTier::new(EvictionPolicy::Lru, 2, 0);
        tier.set("a", 1, Duration::from_secs(60), 1, vec![]);
        tier.set("b", 2, Duration::from_secs(60), 1, vec![]);
        assert_eq!(tier.get("a"), Some(1));
        tier.set("c", 3, Duration::from_secs(60), 1, vec![]);
        assert_eq!(tier.len(), 2);
        assert_eq!(tier.get("b"), None);
        assert_eq!(tier.get("a"), Some(1));
        assert_eq!(tier.get("c"), Some(3));
    }

    #[test]
    fn evicts_oldest_insert_under_fifo() {
        let mut tier: MemoryTier<i32> = MemoryTier::new(EvictionPolicy::Fifo, 2, 0);
        tier.set("a", 1, Duration::from_secs(60), 1, vec![]);
        tier.set("b", 2, Duration::from_secs(60), 1, vec![]);
        tier.get("a");
        tier.set("c", 3, Duration::from_secs(60), 1, vec![]);
        assert_eq!(tier.get("a"), None);
        assert_eq!(tier.get("b"), Some(2));
    }

    #[test]
    fn expired_entries_are_treated_as_misses() {
        let mut tier: MemoryTier<i32> = MemoryTier::new(EvictionPolicy::Lru, 10, 0);
        tier.set("a", 1, Duration::from_millis(0), 1, vec![]);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(tier.get("a"), None);
    }

    #[test]
    fn invalidate_tag_removes_matching_entries_only() {
        let mut tier: MemoryTier<i32> = MemoryTier::new(EvictionPolicy::Lru, 10, 0);
        tier.set("a", 1, Duration::from_secs(60), 1, vec!["tenant:1".into()]);
        tier.set("b", 2, Duration::from_secs(60), 1, vec!["tenant:2".into()]);
        let removed = tier.invalidate_tag("tenant:1");
        assert_eq!(removed, 1);
        assert_eq!(tier.get("a"), None);
        assert_eq!(tier.get("b"), Some(2));
    }

    #[test]
    fn bounded_by_bytes_evicts_when_size_exceeds_budget() {
        let mut tier: MemoryTier<i32> = MemoryTier::new(EvictionPolicy::Lru, 100, 10);
        tier.set("a", 1, Duration::from_secs(60), 6, vec![]);
        tier.set("b", 2, Duration::from_secs(60), 6, vec![]);
        assert!(tier.current_bytes() <= 10);
        assert_eq!(tier.get("a"), None);
    }
}
