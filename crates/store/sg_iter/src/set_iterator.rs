use std::future::Future;

use tokio_util::sync::CancellationToken;

/// A value that owns pooled memory and must be handed back exactly once.
///
/// Rust's ownership rules make the Go-style "`release()` must be called at most once" contract
/// structural rather than advisory: `release` takes `self` by value, so calling it twice on the
/// same value doesn't type-check. What remains to guard against is the other failure mode --
/// *forgetting* to release a releasable batch -- which implementors should catch with a `Drop`
/// impl that `debug_assert!`s the batch was released (see `sg_chunk_refs::SeriesChunkRefsSet` and
/// `sg_loader::ChunkSet`).
pub trait Releasable {
    fn release(self);
}

/// An error type that can represent "this stage was cancelled", letting wrappers like
/// [`crate::Preloaded`] surface cancellation through the normal `err()` channel rather than
/// truncating the stream silently (`spec.md` §5, "`Err` reflects cancellation").
pub trait CancelledError {
    fn cancelled() -> Self;
}

/// A stage that shares the query's single cancellation signal and can be asked to stop, or hand
/// out a cheaply-cloneable handle to do so later (`spec.md` §5: one cancellation signal per
/// query, threaded through every stage rather than each stage minting its own).
pub trait Cancellable {
    fn cancel(&self);
    fn cancel_token(&self) -> CancellationToken;
}

/// The pipeline's core abstraction: a stage that yields owned batches, one per call, in upstream
/// order, until exhaustion or a latched error.
///
/// This collapses `spec.md`'s `Next() bool` / `At() Set` / `Err() error` triad into a single
/// pull: `next()` returning `Some(item)` is `Next() == true` followed by `At()`, and `next()`
/// returning `None` is `Next() == false`, at which point `err()` distinguishes clean exhaustion
/// (`None`) from a terminal failure (`Some`). Ownership of each `Item` moves to the caller, who is
/// responsible for releasing it -- there is no separate borrow-based `At()` to keep alive.
pub trait SetIterator: Send {
    type Item: Send;
    type Error: std::error::Error + Clone + Send + Sync + 'static;

    /// Advances the stage and returns the next batch, or `None` on exhaustion.
    ///
    /// Implementations must be idempotent past exhaustion: once `next()` has returned `None`,
    /// every subsequent call must also return `None` and `err()` must keep returning the same
    /// value (`spec.md` §8, "Idempotent exhaustion").
    fn next(&mut self) -> impl Future<Output = Option<Self::Item>> + Send;

    /// The error that caused exhaustion, if any. `None` after a clean, successful exhaustion.
    fn err(&self) -> Option<&Self::Error>;
}
