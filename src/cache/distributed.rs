//! Two-tier distributed cache: an in-process tier in front of a shared
//! Redis tier, with single-flight population and tag/glob invalidation.
//!
//! Read path: in-process hit → return; miss → shared hit → promote to
//! in-process → return; miss → `None`. Write path: write-through to every
//! tier the caller asked for (default: both).

use std::ops::DerefMut;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::CacheConfig;
use crate::error::{Error, Result};

use super::memory::{EvictionPolicy, MemoryTier};
use super::single_flight::SingleFlight;

#[cfg(feature = "cache")]
use deadpool_redis::Pool as RedisPool;

/// Which tiers a write or invalidation should touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    MemoryOnly,
    SharedOnly,
    Both,
}

/// Point-in-time counters for the background stats emitter.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub memory_bytes: usize,
    pub expired_purged: u64,
}

struct SharedMetadata {
    created_at: i64,
    ttl_secs: u64,
    access_count: u64,
    size: usize,
}

/// Named, two-tier cache. One instance is constructed per logical cache
/// namespace (e.g. `"tts"`, `"mfa-session"`) and shared behind an `Arc`.
pub struct DistributedCache<V> {
    namespace: String,
    memory: Mutex<MemoryTier<V>>,
    #[cfg(feature = "cache")]
    redis: Option<RedisPool>,
    single_flight: SingleFlight<V>,
    default_ttl: Duration,
}

impl<V> DistributedCache<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    #[cfg(feature = "cache")]
    pub fn new(namespace: impl Into<String>, config: &CacheConfig, redis: Option<RedisPool>) -> Result<Self> {
        let policy: EvictionPolicy = config.eviction_policy.parse()?;
        Ok(Self {
            namespace: namespace.into(),
            memory: Mutex::new(MemoryTier::new(policy, config.memory_max_entries, config.memory_max_bytes)),
            redis,
            single_flight: SingleFlight::new(),
            default_ttl: config.default_ttl(),
        })
    }

    #[cfg(not(feature = "cache"))]
    pub fn new(namespace: impl Into<String>, config: &CacheConfig) -> Result<Self> {
        let policy: EvictionPolicy = config.eviction_policy.parse()?;
        Ok(Self {
            namespace: namespace.into(),
            memory: Mutex::new(MemoryTier::new(policy, config.memory_max_entries, config.memory_max_bytes)),
            single_flight: SingleFlight::new(),
            default_ttl: config.default_ttl(),
        })
    }

    fn shared_key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    fn shared_meta_key(&self, key: &str) -> String {
        format!("{}:meta:{key}", self.namespace)
    }

    /// Read path: in-process hit returns immediately; a shared-tier hit is
    /// promoted into the in-process tier before returning.
    pub async fn get(&self, key: &str) -> Option<V> {
        if let Some(value) = self.memory.lock().await.get(key) {
            return Some(value);
        }

        let (value, ttl, size) = self.shared_get(key).await?;
        self.memory.lock().await.set(key, value.clone(), ttl, size, vec![]);
        Some(value)
    }

    /// Write path. `tiers` controls which tier(s) receive the write.
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>, tags: Vec<String>, tiers: Tier) -> Result<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let size = estimated_size(&value);

        if matches!(tiers, Tier::MemoryOnly | Tier::Both) {
            self.memory.lock().await.set(key, value.clone(), ttl, size, tags);
        }
        if matches!(tiers, Tier::SharedOnly | Tier::Both) {
            self.shared_set(key, &value, ttl, size).await?;
        }
        Ok(())
    }

    /// Get-or-populate with single-flight: concurrent misses for the same
    /// key invoke `f` at most once.
    pub async fn get_or_populate<F, Fut>(&self, key: &str, ttl: Option<Duration>, f: F) -> std::result::Result<V, Arc<Error>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let key_owned = key.to_string();
        let value = self.single_flight.run(key, f).await?;
        // A sibling waiter may have already stored this; last-writer-wins,
        // which matches the write-path's stated semantics.
        let _ = self.set(&key_owned, value.clone(), ttl, vec![], Tier::Both).await;
        Ok(value)
    }

    pub async fn invalidate_key(&self, key: &str) -> Result<()> {
        self.memory.lock().await.remove(key);
        self.shared_del(key).await
    }

    /// Tag invalidation is in-process only (shared-tier tag invalidation is
    /// out of scope, per the cache subsystem contract).
    pub async fn invalidate_tag(&self, tag: &str) -> usize {
        self.memory.lock().await.invalidate_tag(tag)
    }

    /// Glob invalidation against the shared tier via a server-side SCAN.
    #[cfg(feature = "cache")]
    pub async fn invalidate_pattern(&self, glob: &str) -> Result<u64> {
        let Some(pool) = &self.redis else {
            return Ok(0);
        };
        let mut conn = pool.get().await.map_err(redis_pool_err)?;
        let match_pattern = format!("{}:{glob}", self.namespace);
        let mut cursor: u64 = 0;
        let mut deleted = 0u64;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&match_pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(conn.deref_mut())
                .await
                .map_err(|e| Error::transient(format!("redis SCAN failed: {e}")))?;

            if !keys.is_empty() {
                let _: () = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(conn.deref_mut())
                    .await
                    .map_err(|e| Error::transient(format!("redis DEL failed: {e}")))?;
                deleted += keys.len() as u64;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(deleted)
    }

    #[cfg(not(feature = "cache"))]
    pub async fn invalidate_pattern(&self, _glob: &str) -> Result<u64> {
        Ok(0)
    }

    /// Purge expired in-process entries. Called on a timer by
    /// [`Self::spawn_background_cleanup`].
    pub async fn purge_expired(&self) -> CacheStats {
        let mut memory = self.memory.lock().await;
        let purged = memory.purge_expired();
        CacheStats {
            memory_entries: memory.len(),
            memory_bytes: memory.current_bytes(),
            expired_purged: purged as u64,
        }
    }

    /// Spawn the periodic expired-entry sweep and stats log, cancellable
    /// via `token`.
    pub fn spawn_background_cleanup(self: Arc<Self>, interval: Duration, token: CancellationToken)
    where
        V: 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let stats = self.purge_expired().await;
                        tracing::debug!(
                            namespace = %self.namespace,
                            memory_entries = stats.memory_entries,
                            memory_bytes = stats.memory_bytes,
                            expired_purged = stats.expired_purged,
                            "cache cleanup tick"
                        );
                    }
                }
            }
        });
    }

    #[cfg(feature = "cache")]
    async fn shared_get(&self, key: &str) -> Option<(V, Duration, usize)> {
        let pool = self.redis.as_ref()?;
        let mut conn = pool.get().await.ok()?;
        let raw: Option<Vec<u8>> = redis::cmd("GET")
            .arg(self.shared_key(key))
            .query_async(conn.deref_mut())
            .await
            .ok()?;
        let raw = raw?;
        let value: V = serde_json::from_slice(&raw).ok()?;

        let meta = self.shared_get_metadata(&mut conn, key).await;
        let _: std::result::Result<(), redis::RedisError> = redis::cmd("HINCRBY")
            .arg(self.shared_meta_key(key))
            .arg("access_count")
            .arg(1)
            .query_async(conn.deref_mut())
            .await;

        let ttl = meta.map(|m| Duration::from_secs(m.ttl_secs)).unwrap_or(self.default_ttl);
        let size = raw.len();
        Some((value, ttl, size))
    }

    #[cfg(feature = "cache")]
    async fn shared_get_metadata(&self, conn: &mut deadpool_redis::Connection, key: &str) -> Option<SharedMetadata> {
        let map: std::collections::HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.shared_meta_key(key))
            .query_async(conn.deref_mut())
            .await
            .ok()?;
        if map.is_empty() {
            return None;
        }
        Some(SharedMetadata {
            created_at: map.get("created_at").and_then(|v| v.parse().ok()).unwrap_or(0),
            ttl_secs: map.get("ttl").and_then(|v| v.parse().ok()).unwrap_or(0),
            access_count: map.get("access_count").and_then(|v| v.parse().ok()).unwrap_or(0),
            size: map.get("size").and_then(|v| v.parse().ok()).unwrap_or(0),
        })
    }

    #[cfg(feature = "cache")]
    async fn shared_set(&self, key: &str, value: &V, ttl: Duration, size: usize) -> Result<()> {
        let Some(pool) = &self.redis else {
            return Ok(());
        };
        let mut conn = pool.get().await.map_err(redis_pool_err)?;
        let bytes = serde_json::to_vec(value).map_err(|e| Error::Internal(format!("cache serialize failed: {e}")))?;

        let _: () = redis::cmd("SET")
            .arg(self.shared_key(key))
            .arg(bytes)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| Error::transient(format!("redis SET failed: {e}")))?;

        let _: () = redis::cmd("HSET")
            .arg(self.shared_meta_key(key))
            .arg("created_at")
            .arg(chrono::Utc::now().timestamp())
            .arg("ttl")
            .arg(ttl.as_secs())
            .arg("access_count")
            .arg(0)
            .arg("size")
            .arg(size)
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| Error::transient(format!("redis HSET failed: {e}")))?;

        let _: () = redis::cmd("EXPIRE")
            .arg(self.shared_meta_key(key))
            .arg(ttl.as_secs().max(1))
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| Error::transient(format!("redis EXPIRE failed: {e}")))?;

        Ok(())
    }

    #[cfg(feature = "cache")]
    async fn shared_del(&self, key: &str) -> Result<()> {
        let Some(pool) = &self.redis else {
            return Ok(());
        };
        let mut conn = pool.get().await.map_err(redis_pool_err)?;
        let _: () = redis::cmd("DEL")
            .arg(self.shared_key(key))
            .arg(self.shared_meta_key(key))
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| Error::transient(format!("redis DEL failed: {e}")))?;
        Ok(())
    }

    #[cfg(not(feature = "cache"))]
    async fn shared_get(&self, _key: &str) -> Option<(V, Duration, usize)> {
        None
    }

    #[cfg(not(feature = "cache"))]
    async fn shared_set(&self, _key: &str, _value: &V, _ttl: Duration, _size: usize) -> Result<()> {
        Ok(())
    }

    #[cfg(not(feature = "cache"))]
    async fn shared_del(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

fn estimated_size<V: Serialize>(value: &V) -> usize {
    serde_json::to_vec(value).map(|b| b.len()).unwrap_or(0)
}

#[cfg(feature = "cache")]
fn redis_pool_err(e: deadpool_redis::PoolError) -> Error {
    Error::transient(format!("redis pool exhausted or unavailable: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CacheConfig {
        CacheConfig {
            memory_max_entries: 100,
            memory_max_bytes: 0,
            default_ttl_s: 60,
            eviction_policy: "lru".to_string(),
            compression_threshold: 1024,
        }
    }

    #[cfg(feature = "cache")]
    fn cache() -> DistributedCache<String> {
        DistributedCache::new("test", &config(), None).unwrap()
    }

    #[cfg(not(feature = "cache"))]
    fn cache() -> DistributedCache<String> {
        DistributedCache::new("test", &config()).unwrap()
    }

    #[tokio::test]
    async fn set_then_get_within_ttl_returns_written_value() {
        let cache = cache();
        cache
            .set("greeting", "hello".to_string(), None, vec![], Tier::MemoryOnly)
            .await
            .unwrap();
        assert_eq!(cache.get("greeting").await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let cache = cache();
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn get_or_populate_invokes_upstream_once_for_concurrent_misses() {
        let cache = Arc::new(cache());
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let run_one = |cache: Arc<DistributedCache<String>>, calls: Arc<std::sync::atomic::AtomicU32>| async move {
            cache
                .get_or_populate("welcome", None, || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok("audio-bytes".to_string())
                    }
                })
                .await
        };

        let (a, b) = tokio::join!(run_one(cache.clone(), calls.clone()), run_one(cache.clone(), calls.clone()));
        assert_eq!(a.unwrap(), "audio-bytes");
        assert_eq!(b.unwrap(), "audio-bytes");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_tag_only_removes_in_process_entries() {
        let cache = cache();
        cache
            .set("a", "1".to_string(), None, vec!["tenant:1".into()], Tier::MemoryOnly)
            .await
            .unwrap();
        let removed = cache.invalidate_tag("tenant:1").await;
        assert_eq!(removed, 1);
        assert_eq!(cache.get("a").await, None);
    }
}
