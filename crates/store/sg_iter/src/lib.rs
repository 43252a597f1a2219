//! Generic set-iterator plumbing.
//!
//! `spec.md` §9 calls for the preloading and duration-measurement stages to be written once and
//! composed over both reference sets and chunk-sets ("implement as a parameterized iterator
//! interface ... In languages without generics, duplicate once per concrete set type"). Rust has
//! generics, so [`Preloaded`] and [`Measured`] are written exactly once here and instantiated by
//! `sg_loader` (over `ChunkSet`) and by anything further upstream that wants preloading over
//! `SeriesChunkRefsSet`.

mod measured;
mod preloaded;
mod set_iterator;

pub use self::measured::Measured;
pub use self::preloaded::Preloaded;
pub use self::set_iterator::{Cancellable, CancelledError, Releasable, SetIterator};
