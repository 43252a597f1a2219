//! The cache adapter contract used by the chunk loader's reader (`spec.md` §4.5).
//!
//! A cache is a best-effort facade: `fetch` never errors (a transport failure degrades to
//! "nothing found"), and `store` is fire-and-forget. This keeps the loader's correctness
//! independent of cache availability -- a down cache only costs latency, never correctness
//! (`spec.md` §4.5, "Rationale for best-effort Fetch").

mod key;
mod memcached;
mod memory;
mod noop;

pub use self::key::CacheKey;
pub use self::memcached::MemcachedCacheAdapter;
pub use self::memory::InMemoryCacheAdapter;
pub use self::noop::NoopCacheAdapter;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub type CacheMap = HashMap<CacheKey, Bytes, ahash::RandomState>;

/// A remote key-value cache, accessed in batches.
///
/// Implementations must be safe to share across every concurrent chunk-read task
/// (`spec.md` §5).
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    /// Fire-and-forget batched set. Per-key failures are accumulated and logged, never returned
    /// to the caller (`spec.md` §4.5).
    async fn store(&self, items: CacheMap, ttl: Duration);

    /// Bulk multi-get returning only hits. Never errors: a transport failure is indistinguishable
    /// from a miss-all response (`spec.md` §4.5).
    async fn fetch(&self, keys: &[CacheKey]) -> CacheMap;

    /// Identifier used for metric labels (`spec.md` §6).
    fn name(&self) -> &str;
}

pub fn empty_map() -> CacheMap {
    CacheMap::default()
}
