use std::sync::Arc;

use bytes::Bytes;
use prometheus_client::registry::Registry;
use sg_cache::{CacheAdapter, InMemoryCacheAdapter};
use sg_chunk_refs::{BlockId, ChunkRef, InMemorySeriesRefsIterator, Label, Labels, SeriesChunkRefs, SeriesChunkRefsSet, TenantId};
use sg_iter::{Releasable, SetIterator};
use sg_loader::{BucketChunkReaders, LoaderConfig, LoaderError, LoaderIterator, SeriesSlicePool};
use sg_memory_pool::SlabPool;
use sg_object_store::{encode_chunk_ref, InMemoryObjectStore};
use sg_telemetry::PipelineMetrics;
use tokio_util::sync::CancellationToken;

fn labels(value: &str) -> Labels {
    Labels::from_sorted([Label {
        name: "a".into(),
        value: value.into(),
    }])
}

fn test_config() -> LoaderConfig {
    LoaderConfig {
        from_batch_size: 4,
        max_concurrent_block_segment_reads: 4,
        coalesce_gap_bytes: 64,
        chunk_size_hint_bytes: 8,
        ..Default::default()
    }
}

// scenario 1: single small batch (`spec.md` §8).
#[tokio::test]
async fn single_small_batch_yields_both_series_with_expected_bytes() {
    let object_store = Arc::new(InMemoryObjectStore::new());
    let block = BlockId::from_uuid(uuid::Uuid::from_u128(1));
    let mut segment = vec![0xAAu8; 8];
    segment.extend(vec![0xBBu8; 8]);
    object_store.put_segment(block, 0, segment);

    let batch = SeriesChunkRefsSet::non_releasable(vec![
        SeriesChunkRefs {
            labels: labels("1"),
            chunks: vec![ChunkRef {
                block_id: block,
                chunk_ref: encode_chunk_ref(0, 0),
                min_time: 0,
                max_time: 100,
            }],
        },
        SeriesChunkRefs {
            labels: labels("2"),
            chunks: vec![ChunkRef {
                block_id: block,
                chunk_ref: encode_chunk_ref(0, 8),
                min_time: 0,
                max_time: 100,
            }],
        },
    ]);
    let upstream = InMemorySeriesRefsIterator::new(vec![batch]);

    let cache = Arc::new(InMemoryCacheAdapter::new("test"));
    let mut registry = Registry::default();
    let metrics = Arc::new(PipelineMetrics::new(&mut registry));
    let reader = BucketChunkReaders::new(object_store.clone(), cache.clone(), TenantId::new("t1"), test_config());
    let series_pool = Arc::new(SeriesSlicePool::new());
    let slab_pool = Arc::new(SlabPool::new(1000));
    let mut loader = LoaderIterator::new(
        upstream,
        reader,
        series_pool,
        slab_pool,
        test_config(),
        metrics,
        CancellationToken::new(),
    );

    let chunk_set = loader.next().await.expect("one batch expected");
    assert_eq!(chunk_set.len(), 2);
    assert_eq!(chunk_set.chunks(0)[0].raw().unwrap(), &Bytes::from(vec![0xAA; 8]));
    assert_eq!(chunk_set.chunks(1)[0].raw().unwrap(), &Bytes::from(vec![0xBB; 8]));

    chunk_set.release();
    assert!(loader.next().await.is_none());
    assert!(loader.err().is_none());
}

// scenario 3: terminal fetch error on a batch (`spec.md` §8).
#[tokio::test]
async fn terminal_fetch_error_surfaces_through_err_and_releases_the_partial_batch() {
    let object_store = Arc::new(InMemoryObjectStore::new());
    let block = BlockId::from_uuid(uuid::Uuid::from_u128(2));
    // No segment uploaded: every read is a NotFound.

    let good_batch = SeriesChunkRefsSet::non_releasable(vec![SeriesChunkRefs {
        labels: labels("ok"),
        chunks: vec![ChunkRef {
            block_id: block,
            chunk_ref: encode_chunk_ref(0, 0),
            min_time: 0,
            max_time: 1,
        }],
    }]);
    let upstream = InMemorySeriesRefsIterator::new(vec![good_batch]);

    let cache = Arc::new(InMemoryCacheAdapter::new("test"));
    let mut registry = Registry::default();
    let metrics = Arc::new(PipelineMetrics::new(&mut registry));
    let reader = BucketChunkReaders::new(object_store.clone(), cache.clone(), TenantId::new("t1"), test_config());
    let mut loader = LoaderIterator::new(
        upstream,
        reader,
        Arc::new(SeriesSlicePool::new()),
        Arc::new(SlabPool::new(1000)),
        test_config(),
        metrics,
        CancellationToken::new(),
    );

    assert!(loader.next().await.is_none());
    assert!(matches!(loader.err(), Some(LoaderError::Read { .. })));

    // Idempotent exhaustion (`spec.md` §8, "Laws").
    assert!(loader.next().await.is_none());
    assert!(matches!(loader.err(), Some(LoaderError::Read { .. })));
}

// scenario 5: slab-pool reuse across two back-to-back runs (`spec.md` §8).
#[tokio::test]
async fn running_the_pipeline_twice_reuses_pooled_series_and_slab_storage() {
    let object_store = Arc::new(InMemoryObjectStore::new());
    let block = BlockId::from_uuid(uuid::Uuid::from_u128(3));
    object_store.put_segment(block, 0, vec![0xCCu8; 8]);

    let make_batch = || {
        SeriesChunkRefsSet::non_releasable(vec![SeriesChunkRefs {
            labels: labels("x"),
            chunks: vec![ChunkRef {
                block_id: block,
                chunk_ref: encode_chunk_ref(0, 0),
                min_time: 0,
                max_time: 1,
            }],
        }])
    };

    let cache = Arc::new(InMemoryCacheAdapter::new("test"));
    let series_pool = Arc::new(SeriesSlicePool::new());
    let slab_pool = Arc::new(SlabPool::new(1000));

    for _ in 0..2 {
        let mut registry = Registry::default();
        let metrics = Arc::new(PipelineMetrics::new(&mut registry));
        let reader = BucketChunkReaders::new(object_store.clone(), cache.clone(), TenantId::new("t1"), test_config());
        let mut loader = LoaderIterator::new(
            InMemorySeriesRefsIterator::new(vec![make_batch()]),
            reader,
            series_pool.clone(),
            slab_pool.clone(),
            test_config(),
            metrics,
            CancellationToken::new(),
        );
        let chunk_set = loader.next().await.unwrap();
        chunk_set.release();
    }

    assert_eq!(
        slab_pool.allocated_slabs(),
        1,
        "the second run should have reused the first run's slab"
    );
    assert_eq!(series_pool.outstanding(), 0);
}

// scenario 6: cache hit path sees zero object-storage reads (`spec.md` §8).
#[tokio::test]
async fn cache_hit_path_avoids_object_storage_entirely() {
    let object_store = Arc::new(InMemoryObjectStore::new());
    let block = BlockId::from_uuid(uuid::Uuid::from_u128(4));
    let cache = Arc::new(InMemoryCacheAdapter::new("test"));

    let tenant = TenantId::new("t1");
    let key = sg_cache::CacheKey::compose(&tenant, block, 0, 0, 8);
    let mut pre = sg_cache::empty_map();
    pre.insert(key, Bytes::from(vec![0xEEu8; 8]));
    cache.store(pre, std::time::Duration::from_secs(60)).await;

    let batch = SeriesChunkRefsSet::non_releasable(vec![SeriesChunkRefs {
        labels: labels("cached"),
        chunks: vec![ChunkRef {
            block_id: block,
            chunk_ref: encode_chunk_ref(0, 0),
            min_time: 0,
            max_time: 1,
        }],
    }]);

    let mut registry = Registry::default();
    let metrics = Arc::new(PipelineMetrics::new(&mut registry));
    let reader = BucketChunkReaders::new(object_store.clone(), cache, tenant, test_config());
    let mut loader = LoaderIterator::new(
        InMemorySeriesRefsIterator::new(vec![batch]),
        reader,
        Arc::new(SeriesSlicePool::new()),
        Arc::new(SlabPool::new(1000)),
        test_config(),
        metrics,
        CancellationToken::new(),
    );

    let chunk_set = loader.next().await.unwrap();
    assert_eq!(chunk_set.chunks(0)[0].raw().unwrap(), &Bytes::from(vec![0xEE; 8]));
    assert_eq!(object_store.reads_served(), 0);
    chunk_set.release();
}
