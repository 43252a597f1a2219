use smallvec::SmallVec;

use crate::BlockId;

/// A single time-series label, e.g. `__name__="http_requests_total"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    pub name: String,
    pub value: String,
}

/// A series' label set.
///
/// Kept sorted by `(name, value)` so that [`Labels`] comparisons -- and therefore the
/// lexicographic ordering the reference stage promises across a [`SeriesChunkRefsSet`] -- are a
/// plain slice comparison.
///
/// Most series carry only a handful of labels, so this is backed by a [`SmallVec`] rather than a
/// heap-allocated `Vec` in the common case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Labels(SmallVec<[Label; 8]>);

impl Labels {
    #[inline]
    pub fn from_sorted(labels: impl IntoIterator<Item = Label>) -> Self {
        let labels: SmallVec<[Label; 8]> = labels.into_iter().collect();
        debug_assert!(
            labels.windows(2).all(|w| w[0] <= w[1]),
            "Labels must be handed to us pre-sorted by the reference stage",
        );
        Self(labels)
    }

    #[inline]
    pub fn as_slice(&self) -> &[Label] {
        &self.0
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.value.as_str())
    }
}

/// A single chunk reference: enough to locate and validate one encoded chunk within a block's
/// chunks file, without having read a single byte of it yet.
///
/// `ref` is deliberately opaque here: only `sg_object_store` knows how to split it into a
/// segment-file id and a byte offset (see `spec.md` §6 and `ChunkRef.ref`'s Open Question in
/// `SPEC_FULL.md` §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRef {
    pub block_id: BlockId,
    /// Opaque handle into the block's chunks file: `segment_file_id << 32 | offset_in_segment`.
    pub chunk_ref: u64,
    pub min_time: i64,
    pub max_time: i64,
}

/// A series' label set paired with the ordered list of chunk references covering the queried
/// time range.
///
/// Released together with the owning [`SeriesChunkRefsSet`]; chunks are in ascending `min_time`
/// and do not overlap across chunk boundaries.
#[derive(Debug, Clone)]
pub struct SeriesChunkRefs {
    pub labels: Labels,
    pub chunks: Vec<ChunkRef>,
}

impl SeriesChunkRefs {
    #[inline]
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }
}
