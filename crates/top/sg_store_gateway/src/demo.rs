//! Builds a small synthetic corpus and runs it through the full pipeline.
//!
//! The postings/index-reader stage that would normally produce [`SeriesChunkRefsSet`] batches is
//! out of scope (`spec.md` §1); this stands in for it with a handful of series backed by bytes
//! seeded directly into the chosen object store.

use std::sync::Arc;

use anyhow::Context as _;
use sg_cache::{CacheAdapter, InMemoryCacheAdapter, MemcachedCacheAdapter, NoopCacheAdapter};
use sg_chunk_refs::{
    BlockId, ChunkRef, InMemorySeriesRefsIterator, Label, Labels, SeriesChunkRefs, SeriesChunkRefsSet, TenantId,
};
use sg_iter::{Measured, Preloaded};
use sg_loader::{BucketChunkReaders, LoaderIterator, SeriesSlicePool};
use sg_memory_pool::SlabPool;
use sg_object_store::{encode_chunk_ref, HttpObjectStore, InMemoryObjectStore, LocalFsObjectStore, ObjectStore};
use sg_series::SeriesSet;
use sg_telemetry::{IteratorStage, PipelineMetrics};
use tokio_util::sync::CancellationToken;

use crate::config::{CacheConfig, ObjectStoreConfig, TopLevelConfig};

const DEMO_SERIES_COUNT: u32 = 8;
const DEMO_CHUNK_BYTES: usize = 32;

fn series_labels(i: u32) -> Labels {
    Labels::from_sorted([
        Label {
            name: "__name__".into(),
            value: "demo_metric".into(),
        },
        Label {
            name: "series".into(),
            value: format!("{i:04}"),
        },
    ])
}

/// Builds the demo block's reference batches, seeding matching bytes into `object_store` along
/// the way. Chunks are grouped two-per-batch to exercise more than one `ChunkSet`.
fn build_reference_batches(block: BlockId, object_store: &InMemoryObjectStore) -> Vec<SeriesChunkRefsSet> {
    let mut batches = Vec::new();
    let mut offset = 0u32;

    for chunk in 0..DEMO_SERIES_COUNT {
        let mut segment = vec![0u8; DEMO_CHUNK_BYTES];
        segment.fill((chunk % 251) as u8);
        object_store.put_segment(block, 0, segment);

        let series = SeriesChunkRefs {
            labels: series_labels(chunk),
            chunks: vec![ChunkRef {
                block_id: block,
                chunk_ref: encode_chunk_ref(0, offset),
                min_time: i64::from(chunk) * 1_000,
                max_time: i64::from(chunk) * 1_000 + 999,
            }],
        };

        if chunk % 2 == 0 {
            batches.push(SeriesChunkRefsSet::non_releasable(vec![series]));
        } else {
            batches
                .last_mut()
                .expect("even chunk always pushed a batch first")
                .push(series);
        }

        offset += DEMO_CHUNK_BYTES as u32;
    }

    batches
}

fn build_object_store(config: &ObjectStoreConfig) -> anyhow::Result<(Arc<dyn ObjectStore>, Option<Arc<InMemoryObjectStore>>)> {
    match config {
        ObjectStoreConfig::InMemory => {
            let store = Arc::new(InMemoryObjectStore::new());
            Ok((store.clone() as Arc<dyn ObjectStore>, Some(store)))
        }
        ObjectStoreConfig::LocalFs { root } => {
            let store = Arc::new(LocalFsObjectStore::new(root.clone()));
            Ok((store, None))
        }
        ObjectStoreConfig::Http { base_url } => {
            let store = Arc::new(HttpObjectStore::new(base_url.clone()));
            Ok((store, None))
        }
    }
}

fn build_cache(config: &CacheConfig, metrics: &Arc<PipelineMetrics>) -> Arc<dyn CacheAdapter> {
    match config {
        CacheConfig::InMemory => Arc::new(InMemoryCacheAdapter::new("demo").with_metrics(Arc::clone(metrics))),
        CacheConfig::None => Arc::new(NoopCacheAdapter),
        CacheConfig::Memcached { address } => {
            Arc::new(MemcachedCacheAdapter::new("demo", address.clone()).with_metrics(Arc::clone(metrics)))
        }
    }
}

/// Runs the demo pipeline to completion, printing each series' labels and loaded byte count.
pub async fn run(config: TopLevelConfig, metrics: Arc<PipelineMetrics>) -> anyhow::Result<()> {
    anyhow::ensure!(
        config.preload_depth >= 2,
        "preload_depth must be at least 2, got {}",
        config.preload_depth
    );

    let (object_store, in_memory_handle) = build_object_store(&config.object_store)?;
    let cache = build_cache(&config.cache, &metrics);
    let tenant = TenantId::new(config.tenant.clone());
    let block = BlockId::from_uuid(uuid::Uuid::new_v4());

    let reference_batches = match &in_memory_handle {
        Some(store) => build_reference_batches(block, store),
        None => {
            anyhow::bail!("the demo corpus seeding only supports the in_memory object store backend")
        }
    };

    // One cancellation token for the whole query, shared by every stage rather than each stage
    // minting its own (`spec.md` §5, "Cancellation").
    let cancel = CancellationToken::new();

    let reader = BucketChunkReaders::new(object_store, cache, tenant, config.loader.clone());
    let loader = LoaderIterator::new(
        InMemorySeriesRefsIterator::new(reference_batches),
        reader,
        Arc::new(SeriesSlicePool::new()),
        Arc::new(SlabPool::new(1_000)),
        config.loader.clone(),
        Arc::clone(&metrics),
        cancel.clone(),
    );
    let measured = Measured::new(loader, Arc::clone(&metrics), IteratorStage::ChunksLoad);
    let preloaded = Preloaded::new(measured, config.preload_depth, cancel);
    let mut series = SeriesSet::new(preloaded);

    let mut printed = 0usize;
    while series.next().await {
        let (labels, chunks) = series.at();
        let bytes: usize = chunks.iter().map(sg_loader::AggrChunk::payload_bytes).sum();
        println!(
            "{} chunks={} bytes={}",
            labels.get("series").unwrap_or("?"),
            chunks.len(),
            bytes,
        );
        printed += 1;
    }

    if let Some(err) = series.err() {
        return Err(anyhow::anyhow!("{err}")).context("pipeline terminated with an error");
    }

    println!("delivered {printed} series");
    Ok(())
}
