use sg_telemetry::{PipelineMetrics, Stopwatch};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{Cancellable, SetIterator};

/// Wraps any [`SetIterator`] and records the wall time of each `next()` call into
/// `iterator_duration_seconds{stage}` (`spec.md` §2, "Measurement stage").
pub struct Measured<I> {
    upstream: I,
    metrics: Arc<PipelineMetrics>,
    stage: sg_telemetry::IteratorStage,
}

impl<I: SetIterator> Measured<I> {
    pub fn new(upstream: I, metrics: Arc<PipelineMetrics>, stage: sg_telemetry::IteratorStage) -> Self {
        Self {
            upstream,
            metrics,
            stage,
        }
    }
}

impl<I: SetIterator> SetIterator for Measured<I> {
    type Item = I::Item;
    type Error = I::Error;

    async fn next(&mut self) -> Option<Self::Item> {
        let stopwatch = Stopwatch::start();
        let item = self.upstream.next().await;
        self.metrics
            .observe_iterator_duration(self.stage, stopwatch.elapsed_seconds());
        item
    }

    fn err(&self) -> Option<&Self::Error> {
        self.upstream.err()
    }
}

impl<I: Cancellable> Cancellable for Measured<I> {
    fn cancel(&self) {
        self.upstream.cancel();
    }

    fn cancel_token(&self) -> CancellationToken {
        self.upstream.cancel_token()
    }
}
