//! Distributed cache subsystem: a bounded in-process tier backed by a
//! shared Redis tier, with single-flight population and tag/glob
//! invalidation. Used by the TTS Router's synthesis cache, MFA session
//! verification, and anywhere else a component needs a cross-replica cache.
//!
//! The Redis connection pool itself (`redis_pool`) is also reused by the
//! host framework's own session/persistence wiring in [`crate::state`].

pub mod distributed;
pub mod entry;
pub mod memory;
pub mod redis_pool;
pub mod single_flight;

pub use distributed::{CacheStats, DistributedCache, Tier};
pub use entry::CacheEntry;
pub use memory::EvictionPolicy;
pub use single_flight::SingleFlight;

#[cfg(feature = "cache")]
pub(crate) use redis_pool::create_pool;
