//! Read-only access to block chunk segment files in object storage (`spec.md` §6).
//!
//! A [`ChunkRef::chunk_ref`](sg_chunk_refs::ChunkRef) is an opaque `u64` everywhere else in the
//! pipeline; this crate is the one place that knows how to split it into a segment file id and a
//! byte offset, and the one place that issues byte-range reads against those files.

mod codec;
mod filesystem;
mod http;
mod memory;

pub use self::codec::{decode_chunk_ref, encode_chunk_ref};
pub use self::filesystem::LocalFsObjectStore;
pub use self::http::HttpObjectStore;
pub use self::memory::InMemoryObjectStore;

use async_trait::async_trait;
use sg_chunk_refs::BlockId;

/// A contiguous byte range to read from one block's segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("block {block_id} segment {segment_file_id}: not found")]
    NotFound { block_id: BlockId, segment_file_id: u32 },

    #[error("block {block_id} segment {segment_file_id}: transport error: {message}")]
    Transport {
        block_id: BlockId,
        segment_file_id: u32,
        message: String,
    },

    #[error("block {block_id} segment {segment_file_id}: requested range out of bounds: {message}")]
    RangeOutOfBounds {
        block_id: BlockId,
        segment_file_id: u32,
        message: String,
    },
}

impl ObjectStoreError {
    /// Whether a retry might succeed (`spec.md` §4.2, "Failure model").
    pub fn is_transient(&self) -> bool {
        matches!(self, ObjectStoreError::Transport { .. })
    }
}

/// Read-only byte-range access to a block's chunk segment files.
///
/// Implementations must be safe to share across every concurrent `(block, segment)` read the
/// chunk reader issues (`spec.md` §5).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn read_range(
        &self,
        block_id: BlockId,
        segment_file_id: u32,
        range: ByteRange,
    ) -> Result<bytes::Bytes, ObjectStoreError>;

    /// Identifier used for logging/metric labels.
    fn name(&self) -> &str;
}
