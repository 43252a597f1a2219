//! Metrics for the chunk-loading pipeline, collected into a single process-wide
//! [`prometheus_client::registry::Registry`] and injected into each stage the way the teacher's
//! server-side telemetry crates (`redap_telemetry`, `re_perf_telemetry`) wire `tracing` spans and
//! `prometheus-client` metrics through constructor injection rather than globals.

mod metrics;
mod stopwatch;

pub use self::metrics::{BatchOutcome, IteratorStage, PipelineMetrics};
pub use self::stopwatch::Stopwatch;
