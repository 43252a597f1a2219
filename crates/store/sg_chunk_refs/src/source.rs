use sg_iter::SetIterator;

use crate::SeriesChunkRefsSet;

/// Errors surfaced by a reference-stage [`SetIterator`].
///
/// The real postings/index-reader stage that produces [`SeriesChunkRefsSet`] batches is out of
/// scope here (`spec.md` §1, "Non-goals"); this crate only defines the error shape the loader
/// stage must be able to propagate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChunkRefsError {
    #[error("reading postings for block {block_id}: {message}")]
    Postings { block_id: String, message: String },

    #[error("resolving series references: {0}")]
    Other(String),
}

/// A test double that yields a fixed, pre-built sequence of [`SeriesChunkRefsSet`] batches.
///
/// Used by `sg_loader` and `sg_series` tests to stand in for the real reference stage without
/// pulling in an index reader.
pub struct InMemorySeriesRefsIterator {
    batches: std::vec::IntoIter<SeriesChunkRefsSet>,
    err: Option<ChunkRefsError>,
    exhausted_err: Option<ChunkRefsError>,
}

impl InMemorySeriesRefsIterator {
    pub fn new(batches: Vec<SeriesChunkRefsSet>) -> Self {
        Self {
            batches: batches.into_iter(),
            err: None,
            exhausted_err: None,
        }
    }

    /// Like [`Self::new`], but fails with `err` once `batches` has been exhausted.
    pub fn with_terminal_error(batches: Vec<SeriesChunkRefsSet>, err: ChunkRefsError) -> Self {
        Self {
            batches: batches.into_iter(),
            err: Some(err),
            exhausted_err: None,
        }
    }
}

impl SetIterator for InMemorySeriesRefsIterator {
    type Item = SeriesChunkRefsSet;
    type Error = ChunkRefsError;

    async fn next(&mut self) -> Option<Self::Item> {
        match self.batches.next() {
            Some(batch) => Some(batch),
            None => {
                self.exhausted_err = self.err.take();
                None
            }
        }
    }

    fn err(&self) -> Option<&Self::Error> {
        self.exhausted_err.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set::SeriesRefsPool;
    use std::sync::Arc;

    #[tokio::test]
    async fn yields_batches_then_exhausts_cleanly() {
        let pool = Arc::new(SeriesRefsPool::new());
        let batch = SeriesChunkRefsSet::new(pool, 0);
        let mut iter = InMemorySeriesRefsIterator::new(vec![batch]);

        assert!(iter.next().await.is_some());
        assert!(iter.next().await.is_none());
        assert!(iter.err().is_none());
    }

    #[tokio::test]
    async fn surfaces_terminal_error_after_batches() {
        let mut iter = InMemorySeriesRefsIterator::with_terminal_error(
            Vec::new(),
            ChunkRefsError::Other("boom".into()),
        );

        assert!(iter.next().await.is_none());
        assert!(matches!(iter.err(), Some(ChunkRefsError::Other(_))));
    }
}
