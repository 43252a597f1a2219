use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sg_telemetry::PipelineMetrics;

use crate::{CacheAdapter, CacheKey, CacheMap};

/// An in-process cache backed by an `ahash` map, with no eviction. Used by tests and by the demo
/// binary's default configuration.
pub struct InMemoryCacheAdapter {
    name: String,
    entries: Mutex<CacheMap>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl InMemoryCacheAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(CacheMap::default()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheAdapter for InMemoryCacheAdapter {
    async fn store(&self, items: CacheMap, _ttl: Duration) {
        self.entries.lock().extend(items);
    }

    async fn fetch(&self, keys: &[CacheKey]) -> CacheMap {
        let entries = self.entries.lock();
        let mut hits = CacheMap::default();
        for key in keys {
            if let Some(bytes) = entries.get(key) {
                hits.insert(key.clone(), bytes.clone());
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_request(&self.name, keys.len(), hits.len());
        }
        hits
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use sg_chunk_refs::{BlockId, TenantId};

    #[tokio::test]
    async fn fetch_returns_only_hits() {
        let cache = InMemoryCacheAdapter::new("test");
        let tenant = TenantId::new("t1");
        let block = BlockId::from_uuid(uuid::Uuid::nil());
        let present = CacheKey::compose(&tenant, block, 0, 0, 4);
        let absent = CacheKey::compose(&tenant, block, 0, 4, 4);

        let mut items = CacheMap::default();
        items.insert(present.clone(), Bytes::from_static(b"data"));
        cache.store(items, Duration::from_secs(60)).await;

        let hits = cache.fetch(&[present.clone(), absent]).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits.get(&present).unwrap(), &Bytes::from_static(b"data"));
    }
}
