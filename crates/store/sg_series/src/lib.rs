//! The series adapter (`spec.md` §4.4): flattens a stream of [`ChunkSet`] batches into a
//! series-at-a-time view for the RPC layer to serialize.
//!
//! Unlike every other stage in this pipeline, `At()`'s contract is explicitly aliasing: the
//! returned `(Labels, [AggrChunk])` view is only valid until the next `Next()` call. That is
//! incompatible with [`sg_iter::SetIterator`]'s per-call owned `Item`, so this crate exposes its
//! own `Next`/`At` pair instead of implementing `SetIterator` -- the one place in this codebase
//! the aliasing demands a streaming-iterator shape rather than the pipeline's usual pull contract.

use sg_chunk_refs::Labels;
use sg_iter::{Cancellable, Releasable, SetIterator};
use sg_loader::{AggrChunk, ChunkSet};
use tokio_util::sync::CancellationToken;

/// Flattens batches from `U` into a series-at-a-time cursor.
///
/// State mirrors `spec.md` §4.4 exactly: a current batch plus an offset into it, with the offset
/// starting past the end of an empty batch so the first `next()` call advances to batch zero.
pub struct SeriesSet<U: SetIterator<Item = ChunkSet>> {
    upstream: U,
    current: Option<ChunkSet>,
    index: usize,
    latched_err: Option<U::Error>,
}

impl<U: SetIterator<Item = ChunkSet>> SeriesSet<U> {
    pub fn new(upstream: U) -> Self {
        Self {
            upstream,
            current: None,
            index: 0,
            latched_err: None,
        }
    }

    /// Advances to the next series, releasing the current batch exactly when iteration moves off
    /// it (`spec.md` §4.4, "the sole release point for loader output on the happy path"). Returns
    /// `false` on exhaustion or a latched upstream error; `err()` distinguishes the two.
    pub async fn next(&mut self) -> bool {
        if self.latched_err.is_some() {
            return false;
        }

        loop {
            self.index += 1;
            let exhausted_current = match self.current.as_ref() {
                Some(batch) => self.index >= batch.len(),
                None => true,
            };

            if !exhausted_current {
                return true;
            }

            if let Some(batch) = self.current.take() {
                batch.release();
            }

            match self.upstream.next().await {
                Some(batch) => {
                    self.index = 0;
                    let is_empty = batch.is_empty();
                    self.current = Some(batch);
                    if !is_empty {
                        return true;
                    }
                    // An empty batch advances straight through to the next upstream batch.
                }
                None => {
                    if let Some(err) = self.upstream.err() {
                        self.latched_err = Some(err.clone());
                    }
                    return false;
                }
            }
        }
    }

    /// The current series' labels and chunks. Aliases the held batch; invalidated by the next
    /// call to [`Self::next`]. Panics if called before a successful `next()`.
    pub fn at(&self) -> (&Labels, &[AggrChunk]) {
        let batch = self
            .current
            .as_ref()
            .expect("at() called before next() returned true");
        (batch.labels(self.index), batch.chunks(self.index))
    }

    pub fn err(&self) -> Option<&U::Error> {
        self.latched_err.as_ref()
    }
}

impl<U: SetIterator<Item = ChunkSet> + Cancellable> SeriesSet<U> {
    /// Signals the query's shared cancellation token (`spec.md` §5, §6: `SeriesSet` is the
    /// downstream-facing boundary, so it must expose the same cancellation capability as its
    /// upstream rather than requiring callers to reach past it).
    pub fn cancel(&self) {
        self.upstream.cancel();
    }

    /// A cheaply-cloneable handle to the same token, for a caller that wants to hold it
    /// separately from the `SeriesSet` itself (e.g. to cancel after moving the set elsewhere).
    pub fn cancel_token(&self) -> CancellationToken {
        self.upstream.cancel_token()
    }
}

impl<U: SetIterator<Item = ChunkSet>> Drop for SeriesSet<U> {
    fn drop(&mut self) {
        // Abandoning iteration mid-batch (e.g. on cancellation) must still release the held
        // batch, or `ChunkSet`'s own `Drop` backstop fires for a leak that didn't actually happen.
        if let Some(batch) = self.current.take() {
            batch.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_chunk_refs::Label;
    use sg_loader::SeriesSlicePool;
    use sg_memory_pool::SlabPool;
    use std::sync::Arc;

    fn labels(name: &str) -> Labels {
        Labels::from_sorted([Label {
            name: "a".into(),
            value: name.into(),
        }])
    }

    fn build_set(names: &[&str]) -> ChunkSet {
        let mut set = ChunkSet::new(
            names.len(),
            true,
            Arc::new(SeriesSlicePool::new()),
            Arc::new(SlabPool::new(1000)),
        );
        for name in names {
            set.push_series(labels(name), &[(0, 1)]);
        }
        set.set_chunks_releaser(Box::new(sg_loader::NoopChunksReleaser));
        set
    }

    #[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
    enum TestError {
        #[error("boom")]
        Boom,
    }

    struct Batches {
        queue: Vec<ChunkSet>,
        err: Option<TestError>,
    }

    impl SetIterator for Batches {
        type Item = ChunkSet;
        type Error = TestError;

        async fn next(&mut self) -> Option<ChunkSet> {
            if self.queue.is_empty() {
                None
            } else {
                Some(self.queue.remove(0))
            }
        }

        fn err(&self) -> Option<&Self::Error> {
            if self.queue.is_empty() {
                self.err.as_ref()
            } else {
                None
            }
        }
    }

    #[tokio::test]
    async fn flattens_batches_in_order() {
        let upstream = Batches {
            queue: vec![build_set(&["a", "b"]), build_set(&["c"])],
            err: None,
        };
        let mut series = SeriesSet::new(upstream);

        let mut seen = Vec::new();
        while series.next().await {
            seen.push(series.at().0.get("a").unwrap().to_string());
        }
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(series.err().is_none());
    }

    #[tokio::test]
    async fn skips_empty_batches_without_pausing_iteration() {
        let upstream = Batches {
            queue: vec![build_set(&[]), build_set(&["only"])],
            err: None,
        };
        let mut series = SeriesSet::new(upstream);

        assert!(series.next().await);
        assert_eq!(series.at().0.get("a").unwrap(), "only");
        assert!(!series.next().await);
    }

    #[tokio::test]
    async fn surfaces_terminal_upstream_error_after_exhaustion() {
        let upstream = Batches {
            queue: vec![build_set(&["a"])],
            err: Some(TestError::Boom),
        };
        let mut series = SeriesSet::new(upstream);

        assert!(series.next().await);
        assert!(!series.next().await);
        assert_eq!(series.err(), Some(&TestError::Boom));
        // Stays latched.
        assert!(!series.next().await);
        assert_eq!(series.err(), Some(&TestError::Boom));
    }

    #[tokio::test]
    async fn dropping_mid_batch_releases_it_without_panicking() {
        let upstream = Batches {
            queue: vec![build_set(&["a", "b"])],
            err: None,
        };
        let mut series = SeriesSet::new(upstream);
        assert!(series.next().await);
        drop(series);
    }
}
