use std::sync::Arc;

use sg_iter::Releasable;
use sg_memory_pool::SlicePool;

use crate::SeriesChunkRefs;

/// Process-wide pool of [`SeriesChunkRefs`] slices, shared across every
/// [`SeriesChunkRefsSet`] produced by the reference stage.
pub type SeriesRefsPool = SlicePool<SeriesChunkRefs>;

/// A batch of series references, as produced by the (external) reference/postings stage.
///
/// Mirrors the ownership rules of `sg_loader::ChunkSet` on the loader side: a releasable set
/// owns its series slice exclusively, and `release()` consumes it so it cannot be called twice.
/// The loader is always the last reader of a `SeriesChunkRefsSet` (`spec.md` §4.2, step 3).
pub struct SeriesChunkRefsSet {
    series: Vec<SeriesChunkRefs>,
    releasable: bool,
    pool: Option<Arc<SeriesRefsPool>>,
    released: bool,
}

impl SeriesChunkRefsSet {
    /// Builds a releasable set backed by `pool`, with a series slice of capacity at least
    /// `capacity`.
    pub fn new(pool: Arc<SeriesRefsPool>, capacity: usize) -> Self {
        let series = pool.grab(capacity);
        Self {
            series,
            releasable: true,
            pool: Some(pool),
            released: false,
        }
    }

    /// Builds a non-releasable set from already-owned data. Used by test doubles and by call
    /// sites that don't participate in pooling (`spec.md` §3, `releasable` flag).
    pub fn non_releasable(series: Vec<SeriesChunkRefs>) -> Self {
        Self {
            series,
            releasable: false,
            pool: None,
            released: false,
        }
    }

    #[inline]
    pub fn series(&self) -> &[SeriesChunkRefs] {
        &self.series
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn push(&mut self, entry: SeriesChunkRefs) {
        self.series.push(entry);
    }
}

impl Releasable for SeriesChunkRefsSet {
    fn release(mut self) {
        if self.releasable {
            self.series.clear();
            if let Some(pool) = self.pool.take() {
                pool.recycle(std::mem::take(&mut self.series));
            }
        }
        self.released = true;
    }
}

impl Drop for SeriesChunkRefsSet {
    fn drop(&mut self) {
        debug_assert!(
            self.released || !self.releasable,
            "SeriesChunkRefsSet dropped without release(): pooled series slice leaked",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Labels;

    fn series(name: &str) -> SeriesChunkRefs {
        SeriesChunkRefs {
            labels: Labels::from_sorted([crate::refs::Label {
                name: "a".into(),
                value: name.into(),
            }]),
            chunks: Vec::new(),
        }
    }

    #[test]
    fn release_returns_slice_to_pool() {
        let pool = Arc::new(SeriesRefsPool::new());
        let mut set = SeriesChunkRefsSet::new(Arc::clone(&pool), 4);
        set.push(series("1"));
        assert_eq!(pool.outstanding(), 1);

        set.release();
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    #[should_panic(expected = "leaked")]
    fn dropping_without_release_is_loud_in_debug_builds() {
        let pool = Arc::new(SeriesRefsPool::new());
        let set = SeriesChunkRefsSet::new(pool, 1);
        drop(set);
    }
}
