use std::sync::Arc;

use sg_chunk_refs::SeriesChunkRefsSet;
use sg_iter::{Cancellable, Releasable, SetIterator};
use sg_memory_pool::SlabPool;
use sg_telemetry::{BatchOutcome, PipelineMetrics};
use tokio_util::sync::CancellationToken;

use crate::aggr_chunk::AggrChunk;
use crate::chunk_set::{ChunkSet, ChunksReleaser, SeriesSlicePool};
use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::reader::{BucketChunkReaders, ChunkLoad};

/// Accounts for the bytes loaded by one batch so they can be reported in
/// `chunks_loader_chunk_bytes_total` at release time, and exists as the concrete
/// [`ChunksReleaser`] the loader attaches to every [`ChunkSet`] it produces (`spec.md` §4.2,
/// step 7).
struct BatchReleaseReport {
    bytes_loaded: u64,
}

impl ChunksReleaser for BatchReleaseReport {
    fn release(self: Box<Self>) {
        // `Bytes` clones free themselves on drop; nothing left to hand back explicitly.
    }
}

/// The loader stage (`spec.md` §4.2): turns a reference-stage [`SeriesChunkRefsSet`] into a
/// populated [`ChunkSet`] by issuing chunk reads through a [`BucketChunkReaders`].
pub struct LoaderIterator<U> {
    upstream: U,
    reader: BucketChunkReaders,
    series_pool: Arc<SeriesSlicePool>,
    slab_pool: Arc<SlabPool<AggrChunk>>,
    config: LoaderConfig,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
    latched_err: Option<LoaderError>,
}

impl<U> LoaderIterator<U>
where
    U: SetIterator<Item = SeriesChunkRefsSet, Error = sg_chunk_refs::ChunkRefsError>,
{
    /// Pools are injected rather than owned as process-wide singletons so tests can observe
    /// allocation/release counts and assert reuse across runs (`spec.md` §9, "Pools as values,
    /// not singletons"; `spec.md` §8, scenario 5).
    ///
    /// `cancel` is the query's shared cancellation token, threaded through from whatever stage
    /// sits at the query boundary (`spec.md` §5: one cancellation signal per query, not one per
    /// pipeline stage) -- not minted locally, so a caller holding only the outermost stage can
    /// still abort in-flight reads here.
    pub fn new(
        upstream: U,
        reader: BucketChunkReaders,
        series_pool: Arc<SeriesSlicePool>,
        slab_pool: Arc<SlabPool<AggrChunk>>,
        config: LoaderConfig,
        metrics: Arc<PipelineMetrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            upstream,
            reader,
            series_pool,
            slab_pool,
            config,
            metrics,
            cancel,
            latched_err: None,
        }
    }

    async fn build_chunk_set(&self, upstream: &SeriesChunkRefsSet) -> Result<(ChunkSet, u64), LoaderError> {
        let capacity = self.config.from_batch_size.max(upstream.len());
        let mut chunk_set = ChunkSet::new(
            capacity,
            true,
            Arc::clone(&self.series_pool),
            Arc::clone(&self.slab_pool),
        );

        let mut loads = Vec::new();
        for (series_index, series_ref) in upstream.series().iter().enumerate() {
            let time_bounds: Vec<(i64, i64)> = series_ref
                .chunks
                .iter()
                .map(|c| (c.min_time, c.max_time))
                .collect();
            chunk_set.push_series(series_ref.labels.clone(), &time_bounds);

            for (chunk_index, chunk_ref) in series_ref.chunks.iter().enumerate() {
                loads.push(ChunkLoad {
                    block_id: chunk_ref.block_id,
                    chunk_ref: chunk_ref.chunk_ref,
                    series_index,
                    chunk_index,
                });
            }
        }

        match self.reader.load(&mut chunk_set, loads, &self.cancel).await {
            Ok(bytes_loaded) => {
                chunk_set.set_chunks_releaser(Box::new(BatchReleaseReport { bytes_loaded }));
                Ok((chunk_set, bytes_loaded))
            }
            Err(err) => {
                chunk_set.set_chunks_releaser(Box::new(BatchReleaseReport { bytes_loaded: 0 }));
                chunk_set.release();
                Err(err)
            }
        }
    }
}

impl<U> SetIterator for LoaderIterator<U>
where
    U: SetIterator<Item = SeriesChunkRefsSet, Error = sg_chunk_refs::ChunkRefsError> + Sync,
{
    type Item = ChunkSet;
    type Error = LoaderError;

    async fn next(&mut self) -> Option<ChunkSet> {
        if self.latched_err.is_some() {
            return None;
        }

        // Step 1-2: advance upstream, latching its error on exhaustion.
        let upstream_batch = match self.upstream.next().await {
            Some(batch) => batch,
            None => {
                if let Some(err) = self.upstream.err() {
                    self.latched_err = Some(LoaderError::References(err.clone()));
                }
                return None;
            }
        };

        // Step 3: the loader is the last reader of references; release on exit either way.
        let result = self.build_chunk_set(&upstream_batch).await;
        upstream_batch.release();

        match result {
            Ok((chunk_set, bytes_loaded)) => {
                self.metrics.record_loader_batch(BatchOutcome::Ok, bytes_loaded);
                Some(chunk_set)
            }
            Err(err) => {
                let outcome = if matches!(err, LoaderError::Cancelled) {
                    BatchOutcome::Cancelled
                } else {
                    BatchOutcome::Error
                };
                tracing::warn!(error = %err, "loader batch failed");
                self.metrics.record_loader_batch(outcome, 0);
                self.latched_err = Some(err);
                None
            }
        }
    }

    fn err(&self) -> Option<&Self::Error> {
        self.latched_err.as_ref()
    }
}

impl<U> Cancellable for LoaderIterator<U> {
    fn cancel(&self) {
        self.cancel.cancel();
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
