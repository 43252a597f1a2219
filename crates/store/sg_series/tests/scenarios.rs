use std::sync::Arc;

use prometheus_client::registry::Registry;
use sg_cache::InMemoryCacheAdapter;
use sg_chunk_refs::{BlockId, ChunkRef, InMemorySeriesRefsIterator, Label, Labels, SeriesChunkRefs, SeriesChunkRefsSet, TenantId};
use sg_iter::{Measured, Preloaded};
use sg_loader::{BucketChunkReaders, LoaderConfig, LoaderIterator, SeriesSlicePool};
use sg_memory_pool::SlabPool;
use sg_object_store::{encode_chunk_ref, InMemoryObjectStore};
use sg_series::SeriesSet;
use sg_telemetry::{IteratorStage, PipelineMetrics};
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

fn one_series_batch(block: BlockId, name: &str, offset: u32) -> SeriesChunkRefsSet {
    SeriesChunkRefsSet::non_releasable(vec![SeriesChunkRefs {
        labels: labels(name),
        chunks: vec![ChunkRef {
            block_id: block,
            chunk_ref: encode_chunk_ref(0, offset),
            min_time: 0,
            max_time: 1,
        }],
    }])
}

fn full_pipeline(
    batches: Vec<SeriesChunkRefsSet>,
    object_store: Arc<InMemoryObjectStore>,
    metrics: Arc<PipelineMetrics>,
) -> SeriesSet<Preloaded<Measured<LoaderIterator<InMemorySeriesRefsIterator>>>> {
    let cache = Arc::new(InMemoryCacheAdapter::new("cache").with_metrics(Arc::clone(&metrics)));
    let reader = BucketChunkReaders::new(object_store, cache, TenantId::new("t1"), test_config());
    // One shared cancellation token for the whole query (`spec.md` §5).
    let cancel = CancellationToken::new();
    let loader = LoaderIterator::new(
        InMemorySeriesRefsIterator::new(batches),
        reader,
        Arc::new(SeriesSlicePool::new()),
        Arc::new(SlabPool::new(1000)),
        test_config(),
        metrics.clone(),
        cancel.clone(),
    );
    let measured = Measured::new(loader, metrics, IteratorStage::ChunksLoad);
    // Preload depth 3: up to two batches in flight beyond the one the consumer holds (`spec.md`
    // §8, scenario 2).
    let preloaded = Preloaded::new(measured, 3, cancel);
    SeriesSet::new(preloaded)
}

// scenario 2: multiple batches flow through preloading depth 3 in order (`spec.md` §8).
#[tokio::test]
async fn multi_batch_pipeline_preserves_order_across_preloaded_batches() {
    let object_store = Arc::new(InMemoryObjectStore::new());
    let block = BlockId::from_uuid(uuid::Uuid::from_u128(1));
    for offset in 0..5 {
        object_store.put_segment(block, 0, vec![offset as u8; 8]);
    }

    let batches: Vec<SeriesChunkRefsSet> = (0..5)
        .map(|i| one_series_batch(block, &format!("series-{i}"), i as u32 * 8))
        .collect();

    let mut registry = Registry::default();
    let metrics = Arc::new(PipelineMetrics::new(&mut registry));
    let mut series = full_pipeline(batches, object_store, metrics);

    let mut seen = Vec::new();
    while series.next().await {
        seen.push(series.at().0.get("a").unwrap().to_string());
    }
    assert_eq!(
        seen,
        vec!["series-0", "series-1", "series-2", "series-3", "series-4"]
    );
    assert!(series.err().is_none());
}

// scenario 4: cancelling mid-stream stops delivery promptly without panicking on drop
// (`spec.md` §8, §5 "Cancellation").
#[tokio::test]
async fn cancelling_mid_stream_stops_delivery_without_leaking() {
    let object_store = Arc::new(InMemoryObjectStore::new());
    let block = BlockId::from_uuid(uuid::Uuid::from_u128(1));
    for offset in 0..50 {
        object_store.put_segment(block, 0, vec![offset as u8; 8]);
    }

    let batches: Vec<SeriesChunkRefsSet> = (0..50)
        .map(|i| one_series_batch(block, &format!("series-{i}"), i as u32 * 8))
        .collect();

    let mut registry = Registry::default();
    let metrics = Arc::new(PipelineMetrics::new(&mut registry));
    let mut series = full_pipeline(batches, object_store, metrics);

    assert!(series.next().await);
    series.cancel();

    // Drain whatever was already in flight, then expect prompt exhaustion.
    let mut drained = 0;
    while series.next().await {
        drained += 1;
        assert!(drained <= 6, "cancellation should be observed promptly");
    }
    assert!(
        matches!(series.err(), Some(sg_loader::LoaderError::Cancelled)),
        "err() should reflect cancellation, got {:?}",
        series.err()
    );
    drop(series);
}
