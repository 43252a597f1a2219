/// Packs a segment file id and an in-segment byte offset into the opaque `u64` carried by
/// `ChunkRef.chunk_ref` (`spec.md` §6: `segmentFileID << 32 | offsetInSegment`).
#[inline]
pub fn encode_chunk_ref(segment_file_id: u32, offset_in_segment: u32) -> u64 {
    (u64::from(segment_file_id) << 32) | u64::from(offset_in_segment)
}

/// Inverse of [`encode_chunk_ref`]. Must match whichever writer produced the reference bit for
/// bit (`spec.md` §9, Open Question (b)).
#[inline]
pub fn decode_chunk_ref(chunk_ref: u64) -> (u32, u32) {
    let segment_file_id = (chunk_ref >> 32) as u32;
    let offset_in_segment = chunk_ref as u32;
    (segment_file_id, offset_in_segment)
}
