use std::time::Duration;

use sg_backoff::BackoffConfig;
use serde::Deserialize;

fn default_from_batch_size() -> usize {
    1_000
}
fn default_max_concurrent_block_segment_reads() -> usize {
    16
}
fn default_coalesce_gap_bytes() -> u64 {
    512 * 1024
}
fn default_chunk_size_hint_bytes() -> u64 {
    16 * 1024
}
fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_retry_max_attempts() -> u32 {
    5
}
fn default_retry_base_delay_ms() -> u64 {
    50
}
fn default_retry_max_delay_ms() -> u64 {
    5_000
}

/// Tunables for the loader stage, all overridable from the top-level configuration file
/// (`SPEC_FULL.md` §4.2, "Configuration surface").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Batch-size hint used to over-provision `ChunkSet` capacity so the pooled slice size
    /// converges across batches (`spec.md` §4.2, step 4).
    #[serde(default = "default_from_batch_size")]
    pub from_batch_size: usize,

    /// Upper bound on concurrently in-flight `(block, segment)` reads.
    #[serde(default = "default_max_concurrent_block_segment_reads")]
    pub max_concurrent_block_segment_reads: usize,

    /// Offsets within this many bytes of each other are coalesced into a single range read.
    #[serde(default = "default_coalesce_gap_bytes")]
    pub coalesce_gap_bytes: u64,

    /// Speculative read size for a single chunk when its exact length isn't yet known. A
    /// chunk's slice into the fetched range is clamped to the bytes actually returned; a chunk
    /// whose real length exceeds the hint is silently truncated rather than re-fetched (see
    /// DESIGN.md, "Wire-format simplification").
    #[serde(default = "default_chunk_size_hint_bytes")]
    pub chunk_size_hint_bytes: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            from_batch_size: default_from_batch_size(),
            max_concurrent_block_segment_reads: default_max_concurrent_block_segment_reads(),
            coalesce_gap_bytes: default_coalesce_gap_bytes(),
            chunk_size_hint_bytes: default_chunk_size_hint_bytes(),
            cache_ttl_secs: default_cache_ttl_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl LoaderConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_backoff(&self) -> BackoffConfig {
        BackoffConfig {
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            max_attempts: self.retry_max_attempts,
        }
    }
}
