use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use sg_cache::{CacheAdapter, CacheKey, CacheMap};
use sg_chunk_refs::{BlockId, TenantId};
use sg_object_store::{ByteRange, ObjectStore};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::chunk_set::ChunkSet;
use crate::config::LoaderConfig;
use crate::error::LoaderError;

/// A single chunk to load, addressed by where it ends up in the output [`ChunkSet`]
/// (`spec.md` §4.2, step 6: `addLoad(blockID, ref, seriesIndex, chunkIndex)`).
#[derive(Debug, Clone, Copy)]
pub struct ChunkLoad {
    pub block_id: BlockId,
    pub chunk_ref: u64,
    pub series_index: usize,
    pub chunk_index: usize,
}

struct LoadedChunk {
    series_index: usize,
    chunk_index: usize,
    bytes: Bytes,
}

/// Schedules and performs chunk reads across every block referenced in a batch
/// (`spec.md` §4.2, "Chunk reader algorithm").
pub struct BucketChunkReaders {
    object_store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheAdapter>,
    tenant: TenantId,
    config: LoaderConfig,
}

impl BucketChunkReaders {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        cache: Arc<dyn CacheAdapter>,
        tenant: TenantId,
        config: LoaderConfig,
    ) -> Self {
        Self {
            object_store,
            cache,
            tenant,
            config,
        }
    }

    /// Groups `loads` by block then segment file, coalesces offsets into range reads, fetches
    /// each range (cache first, object storage on miss), and writes parsed payloads into
    /// `chunk_set`'s fixed `(seriesIndex, chunkIndex)` slots. Returns the total bytes loaded.
    ///
    /// Parallelism across `(block, segment)` groups is bounded by
    /// `max_concurrent_block_segment_reads`; ordering is preserved because results carry their
    /// own destination slot and are applied after every group completes.
    pub async fn load(
        &self,
        chunk_set: &mut ChunkSet,
        loads: Vec<ChunkLoad>,
        cancel: &CancellationToken,
    ) -> Result<u64, LoaderError> {
        let mut by_group: BTreeMap<(BlockId, u32), Vec<ChunkLoad>> = BTreeMap::new();
        for load in loads {
            let (segment_file_id, _) = sg_object_store::decode_chunk_ref(load.chunk_ref);
            by_group.entry((load.block_id, segment_file_id)).or_default().push(load);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_block_segment_reads.max(1)));
        let mut join_set: JoinSet<Result<Vec<LoadedChunk>, LoaderError>> = JoinSet::new();

        for ((block_id, segment_file_id), group) in by_group {
            let semaphore = Arc::clone(&semaphore);
            let object_store = Arc::clone(&self.object_store);
            let cache = Arc::clone(&self.cache);
            let tenant = self.tenant.clone();
            let config = self.config.clone();
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                read_group(
                    block_id,
                    segment_file_id,
                    group,
                    object_store,
                    cache,
                    &tenant,
                    &config,
                    &cancel,
                )
                .await
            });
        }

        let mut total_bytes = 0u64;
        while let Some(result) = join_set.join_next().await {
            let loaded = result.expect("chunk reader task panicked")?;
            for chunk in loaded {
                total_bytes += chunk.bytes.len() as u64;
                chunk_set.chunks_mut(chunk.series_index)[chunk.chunk_index].set_raw(chunk.bytes);
            }
        }

        Ok(total_bytes)
    }
}

struct CoalescedRange {
    range: ByteRange,
    loads: Vec<ChunkLoad>,
}

/// Sorts `loads` by offset and merges consecutive (or near-consecutive, within
/// `coalesce_gap_bytes`) reads into single range requests (`spec.md` §4.2).
fn coalesce(mut loads: Vec<ChunkLoad>, gap_bytes: u64, chunk_hint: u64) -> Vec<CoalescedRange> {
    loads.sort_by_key(|l| sg_object_store::decode_chunk_ref(l.chunk_ref).1);

    let mut ranges: Vec<CoalescedRange> = Vec::new();
    for load in loads {
        let (_, offset) = sg_object_store::decode_chunk_ref(load.chunk_ref);
        let offset = u64::from(offset);

        if let Some(last) = ranges.last_mut() {
            let range_end = last.range.offset + last.range.length;
            if offset <= range_end + gap_bytes {
                let new_end = (offset + chunk_hint).max(range_end);
                last.range.length = new_end - last.range.offset;
                last.loads.push(load);
                continue;
            }
        }

        ranges.push(CoalescedRange {
            range: ByteRange { offset, length: chunk_hint },
            loads: vec![load],
        });
    }
    ranges
}

#[allow(clippy::too_many_arguments)]
async fn read_group(
    block_id: BlockId,
    segment_file_id: u32,
    loads: Vec<ChunkLoad>,
    object_store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheAdapter>,
    tenant: &TenantId,
    config: &LoaderConfig,
    cancel: &CancellationToken,
) -> Result<Vec<LoadedChunk>, LoaderError> {
    let mut results = Vec::with_capacity(loads.len());

    for coalesced in coalesce(loads, config.coalesce_gap_bytes, config.chunk_size_hint_bytes) {
        if cancel.is_cancelled() {
            return Err(LoaderError::Cancelled);
        }

        let keys: Vec<CacheKey> = coalesced
            .loads
            .iter()
            .map(|load| {
                let (_, offset) = sg_object_store::decode_chunk_ref(load.chunk_ref);
                CacheKey::compose(
                    tenant,
                    block_id,
                    segment_file_id,
                    u64::from(offset),
                    config.chunk_size_hint_bytes,
                )
            })
            .collect();

        let cached = cache.fetch(&keys).await;
        let all_cached = cached.len() == keys.len();

        let bytes = if all_cached {
            None
        } else {
            let range = coalesced.range;
            let fetch = || {
                let object_store = Arc::clone(&object_store);
                async move { object_store.read_range(block_id, segment_file_id, range).await }
            };
            let fetched = sg_backoff::retry(
                config.retry_backoff(),
                |err: &sg_object_store::ObjectStoreError| err.is_transient(),
                fetch,
            )
            .await
            .map_err(|source| LoaderError::Read {
                block_id,
                segment_file_id,
                source,
            })?;
            Some(fetched)
        };

        if let Some(fetched) = &bytes {
            let mut to_store = CacheMap::default();
            for (key, load) in keys.iter().zip(coalesced.loads.iter()) {
                if cached.contains_key(key) {
                    continue;
                }
                let (_, offset) = sg_object_store::decode_chunk_ref(load.chunk_ref);
                let rel_start = (u64::from(offset) - coalesced.range.offset) as usize;
                let rel_end = (rel_start + config.chunk_size_hint_bytes as usize).min(fetched.len());
                to_store.insert(key.clone(), fetched.slice(rel_start..rel_end));
            }
            cache.store(to_store, config.cache_ttl()).await;
        }

        for (key, load) in keys.iter().zip(coalesced.loads.iter()) {
            let payload = match cached.get(key) {
                Some(hit) => hit.clone(),
                None => {
                    let fetched = bytes.as_ref().expect("fetched bytes present on any miss");
                    let (_, offset) = sg_object_store::decode_chunk_ref(load.chunk_ref);
                    let rel_start = (u64::from(offset) - coalesced.range.offset) as usize;
                    let rel_end = (rel_start + config.chunk_size_hint_bytes as usize).min(fetched.len());
                    fetched.slice(rel_start..rel_end)
                }
            };
            results.push(LoadedChunk {
                series_index: load.series_index,
                chunk_index: load.chunk_index,
                bytes: payload,
            });
        }
    }

    Ok(results)
}
