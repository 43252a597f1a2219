//! Pooled allocation for the chunk-loading pipeline: a capacity-keyed slice pool for series
//! slices, and a slab pool for `AggrChunk`-style payloads that must be handed out as exactly-
//! sized contiguous windows while still being released as one coarse-grained unit.
//!
//! Both pools are process-wide, `Send + Sync`, and carry no per-query affinity: the pipeline
//! injects `Arc<SlicePool<T>>` / `Arc<SlabPool<T>>` values so tests can swap in fresh pools and
//! observe allocation/return counts (`spec.md` §9, "Pools as values, not singletons").

mod slab;
mod slice;

pub use self::slab::{SlabArena, SlabPool, SlabSlice};
pub use self::slice::SlicePool;
