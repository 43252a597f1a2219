use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Cancellable, CancelledError, SetIterator};

/// Runs `upstream` on a background task, pulling batches as fast as a bounded channel allows so
/// that a downstream consumer calling `next()` typically finds a batch already waiting
/// (`spec.md` §4.3).
///
/// The channel holds `preloaded_count - 1` batches; the `-1` accounts for the batch the consumer
/// is currently holding outside the channel, matching `spec.md`'s accounting exactly.
pub struct Preloaded<I: SetIterator + 'static> {
    receiver: mpsc::Receiver<I::Item>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    error: Arc<Mutex<Option<I::Error>>>,
    cached_err: Option<I::Error>,
}

impl<I> Preloaded<I>
where
    I: SetIterator + 'static,
    I::Error: CancelledError,
{
    /// `preloaded_count` must be at least 2: one batch in flight in the channel plus the one the
    /// consumer holds.
    ///
    /// `cancel` is the query's shared cancellation token (`spec.md` §5): the same token given to
    /// `upstream`, so cancelling it here also aborts whatever in-flight work `upstream` is doing,
    /// rather than stopping this stage's delivery loop while upstream keeps running.
    pub fn new(upstream: I, preloaded_count: usize, cancel: CancellationToken) -> Self {
        assert!(
            preloaded_count >= 2,
            "preloaded_count must allow at least one in-flight batch beyond the one the consumer holds, got {preloaded_count}",
        );

        let (tx, rx) = mpsc::channel(preloaded_count - 1);
        let error = Arc::new(Mutex::new(None));

        let task = tokio::spawn(Self::run(upstream, tx, cancel.clone(), Arc::clone(&error)));

        Self {
            receiver: rx,
            cancel,
            task: Some(task),
            error,
            cached_err: None,
        }
    }

    async fn run(
        mut upstream: I,
        tx: mpsc::Sender<I::Item>,
        cancel: CancellationToken,
        error: Arc<Mutex<Option<I::Error>>>,
    ) {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    *error.lock() = Some(I::Error::cancelled());
                    return;
                }
                next = upstream.next() => next,
            };

            match next {
                Some(item) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            *error.lock() = Some(I::Error::cancelled());
                            return;
                        }
                        result = tx.send(item) => {
                            if result.is_err() {
                                // Consumer dropped us: nothing left to do.
                                return;
                            }
                        }
                    }
                }
                None => {
                    if let Some(err) = upstream.err() {
                        *error.lock() = Some(err.clone());
                    }
                    return;
                }
            }
        }
    }

}

impl<I: SetIterator + 'static> Cancellable for Preloaded<I> {
    /// Signals the background producer to stop. Any in-flight `upstream.next()` is only
    /// surfaced if it completes before cancellation is observed; no further sends happen after
    /// this call returns (`spec.md` §4.3, "Cancellation").
    fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A cheaply-cloneable handle that can cancel this producer from outside, even after `self`
    /// has been moved into a downstream wrapper (e.g. `sg_series::SeriesSet`).
    fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl<I: SetIterator + 'static> SetIterator for Preloaded<I> {
    type Item = I::Item;
    type Error = I::Error;

    async fn next(&mut self) -> Option<Self::Item> {
        match self.receiver.recv().await {
            Some(item) => Some(item),
            None => {
                // Keep whatever we've already latched: idempotent exhaustion (`spec.md` §8).
                if self.cached_err.is_none() {
                    self.cached_err = self.error.lock().take();
                }
                None
            }
        }
    }

    fn err(&self) -> Option<&Self::Error> {
        self.cached_err.as_ref()
    }
}

impl<I: SetIterator + 'static> Drop for Preloaded<I> {
    fn drop(&mut self) {
        // If the caller abandoned iteration without calling `cancel()`, the producer could
        // otherwise block forever trying to send into a channel nobody drains
        // (`spec.md` §4.3, "Hazard"). Cancelling and aborting here is the backstop, not a
        // substitute for callers doing the right thing.
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
