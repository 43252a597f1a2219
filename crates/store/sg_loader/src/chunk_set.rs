use std::sync::Arc;

use sg_chunk_refs::Labels;
use sg_iter::Releasable;
use sg_memory_pool::{SlabArena, SlabPool, SlabSlice, SlicePool};

use crate::aggr_chunk::AggrChunk;

pub type SeriesSlicePool = SlicePool<SeriesSlot>;

/// One series' labels plus the location of its chunk slice within the set's slab arena.
pub struct SeriesSlot {
    pub labels: Labels,
    chunks: SlabSlice,
}

/// A capability that releases whatever backed the byte payloads of a [`ChunkSet`]'s chunks.
///
/// Held by the set, invoked exactly once on release (`spec.md` §3, §9 "No cyclic ownership").
pub trait ChunksReleaser: Send {
    fn release(self: Box<Self>);
}

/// A releaser that does nothing beyond existing: `Bytes`'s own reference counting already frees
/// chunk payloads once nothing retains them, so there is no separate buffer pool to hand back.
/// Used by non-releasable / test chunk-sets.
pub struct NoopChunksReleaser;

impl ChunksReleaser for NoopChunksReleaser {
    fn release(self: Box<Self>) {}
}

/// A batch of fully loaded series and their chunks -- the loader stage's output
/// (`spec.md` §3, §4.1).
///
/// Series-slice storage comes from a [`SeriesSlicePool`]; chunk storage comes from a
/// `SlabPool<AggrChunk>` via a lazily-populated [`SlabArena`]. Both are only non-releasable (and
/// thus un-pooled) for sets built outside the loader, e.g. by tests.
pub struct ChunkSet {
    series: Vec<SeriesSlot>,
    arena: Option<SlabArena<AggrChunk>>,
    releasable: bool,
    series_pool: Option<Arc<SeriesSlicePool>>,
    chunks_releaser: Option<Box<dyn ChunksReleaser>>,
    released: bool,
}

impl ChunkSet {
    /// `newChunkSet(capacity, releasable)` from `spec.md` §4.1: guarantees the series slice has
    /// capacity at least `capacity`. An undersized recycled slice is discarded, never re-grown.
    pub fn new(
        capacity: usize,
        releasable: bool,
        series_pool: Arc<SeriesSlicePool>,
        slab_pool: Arc<SlabPool<AggrChunk>>,
    ) -> Self {
        let series = if releasable {
            series_pool.grab(capacity)
        } else {
            Vec::with_capacity(capacity)
        };
        Self {
            series,
            arena: Some(SlabArena::new(slab_pool)),
            releasable,
            series_pool: releasable.then_some(series_pool),
            chunks_releaser: None,
            released: false,
        }
    }

    pub fn set_chunks_releaser(&mut self, releaser: Box<dyn ChunksReleaser>) {
        self.chunks_releaser = Some(releaser);
    }

    /// Appends a series with `time_bounds.len()` freshly carved `AggrChunk` slots, one per chunk
    /// reference, with `min_time`/`max_time` pre-populated (`spec.md` §4.2, step 5). Returns the
    /// series' index within this set.
    pub fn push_series(&mut self, labels: Labels, time_bounds: &[(i64, i64)]) -> usize {
        let arena = self.arena.as_mut().expect("chunk set already released");
        let loc = arena.reserve(time_bounds.len());
        for (slot, (min_time, max_time)) in arena.get_mut(loc).iter_mut().zip(time_bounds) {
            *slot = AggrChunk::with_time_bounds(*min_time, *max_time);
        }
        self.series.push(SeriesSlot { labels, chunks: loc });
        self.series.len() - 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn labels(&self, series_index: usize) -> &Labels {
        &self.series[series_index].labels
    }

    pub fn chunks(&self, series_index: usize) -> &[AggrChunk] {
        self.arena
            .as_ref()
            .expect("chunk set already released")
            .get(self.series[series_index].chunks)
    }

    pub fn chunks_mut(&mut self, series_index: usize) -> &mut [AggrChunk] {
        let loc = self.series[series_index].chunks;
        self.arena
            .as_mut()
            .expect("chunk set already released")
            .get_mut(loc)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Labels, &[AggrChunk])> {
        (0..self.len()).map(move |i| (self.labels(i), self.chunks(i)))
    }
}

impl Releasable for ChunkSet {
    /// `release()` from `spec.md` §4.1: invoke the chunks releaser first, then (if releasable)
    /// reset every chunk, return the slab(s), and return the truncated series slice to its pool.
    fn release(mut self) {
        if let Some(releaser) = self.chunks_releaser.take() {
            releaser.release();
        }

        if self.releasable {
            let mut arena = self.arena.take().expect("chunk set already released");
            let locs: Vec<SlabSlice> = self.series.iter().map(|s| s.chunks).collect();
            for chunk in arena.get_many_mut(&locs).into_iter().flatten() {
                chunk.reset();
            }
            self.series.clear();
            if let Some(pool) = self.series_pool.take() {
                pool.recycle(std::mem::take(&mut self.series));
            }
            arena.release();
        } else {
            self.arena.take();
        }

        self.released = true;
    }
}

impl Drop for ChunkSet {
    fn drop(&mut self) {
        debug_assert!(
            self.released,
            "ChunkSet dropped without release(): pooled series/chunk storage leaked",
        );
    }
}
