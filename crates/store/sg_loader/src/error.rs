use sg_chunk_refs::BlockId;
use sg_iter::CancelledError;

/// Errors surfaced by the loader stage (`spec.md` §7).
///
/// *Upstream-exhausted* and *cache* failures never reach this type: the former is plain
/// iterator exhaustion, the latter is converted to a miss inside `sg_cache`. Only references
/// errors, terminal fetch errors, and cancellation propagate here.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoaderError {
    #[error("reference stage: {0}")]
    References(#[from] sg_chunk_refs::ChunkRefsError),

    #[error("reading chunk for block {block_id} segment {segment_file_id}: {source}")]
    Read {
        block_id: BlockId,
        segment_file_id: u32,
        #[source]
        source: sg_object_store::ObjectStoreError,
    },

    #[error("loader cancelled")]
    Cancelled,
}

impl LoaderError {
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, LoaderError::Read { source, .. } if source.is_transient())
    }
}

impl CancelledError for LoaderError {
    fn cancelled() -> Self {
        LoaderError::Cancelled
    }
}
