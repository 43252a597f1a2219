//! The loader stage (`spec.md` §4.2): turns batches of series-chunk references into batches of
//! fully loaded series, reading chunk bytes from a cache-fronted object store.

mod aggr_chunk;
mod chunk_set;
mod config;
mod error;
mod iterator;
mod reader;

pub use self::aggr_chunk::AggrChunk;
pub use self::chunk_set::{ChunkSet, ChunksReleaser, NoopChunksReleaser, SeriesSlicePool};
pub use self::config::LoaderConfig;
pub use self::error::LoaderError;
pub use self::iterator::LoaderIterator;
pub use self::reader::{BucketChunkReaders, ChunkLoad};
