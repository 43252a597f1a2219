use std::time::Instant;

/// A trivial RAII-free timer; kept separate from `PipelineMetrics` so `sg_iter`'s generic
/// `Measured<I>` wrapper doesn't need to know about label types.
pub struct Stopwatch(Instant);

impl Stopwatch {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.0.elapsed().as_secs_f64()
    }
}
