use std::time::Duration;

use async_trait::async_trait;

use crate::{CacheAdapter, CacheKey, CacheMap};

/// A cache adapter that never stores or finds anything. Lets the pipeline run with caching
/// disabled without special-casing a missing cache everywhere else (`spec.md` §4.5, "the loader
/// must be able to make progress under a degraded cache" -- the degenerate case of always-down).
pub struct NoopCacheAdapter;

#[async_trait]
impl CacheAdapter for NoopCacheAdapter {
    async fn store(&self, _items: CacheMap, _ttl: Duration) {}

    async fn fetch(&self, _keys: &[CacheKey]) -> CacheMap {
        CacheMap::default()
    }

    fn name(&self) -> &str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_is_always_empty() {
        let cache = NoopCacheAdapter;
        let tenant = sg_chunk_refs::TenantId::new("t");
        let block = sg_chunk_refs::BlockId::from_uuid(uuid::Uuid::nil());
        let key = CacheKey::compose(&tenant, block, 0, 0, 4);
        assert!(cache.fetch(&[key]).await.is_empty());
    }
}
