use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
struct CacheLabels {
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue)]
pub enum IteratorStage {
    ChunksLoad,
    ChunksPreloaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
struct StageLabels {
    stage: IteratorStage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue)]
pub enum BatchOutcome {
    Ok,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
struct BatchLabels {
    outcome: BatchOutcome,
}

/// All metrics emitted by the pipeline, as specified in `spec.md` §6 plus the additions recorded
/// in `SPEC_FULL.md` §6.
pub struct PipelineMetrics {
    cache_requests_total: Family<CacheLabels, Counter>,
    cache_hits_total: Family<CacheLabels, Counter>,
    iterator_duration_seconds: Family<StageLabels, Histogram>,
    loader_batches_total: Family<BatchLabels, Counter>,
    loader_chunk_bytes_total: Counter,
}

impl PipelineMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let cache_requests_total = Family::<CacheLabels, Counter>::default();
        let cache_hits_total = Family::<CacheLabels, Counter>::default();
        let iterator_duration_seconds = Family::<StageLabels, Histogram>::new_with_constructor(
            || Histogram::new([0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0].into_iter()),
        );
        let loader_batches_total = Family::<BatchLabels, Counter>::default();
        let loader_chunk_bytes_total = Counter::default();

        registry.register(
            "cache_requests",
            "Total cache lookups issued, keyed by cache name",
            cache_requests_total.clone(),
        );
        registry.register(
            "cache_hits",
            "Total cache lookups that were hits, keyed by cache name",
            cache_hits_total.clone(),
        );
        registry.register(
            "iterator_duration_seconds",
            "Wall time spent in Next() per pipeline stage",
            iterator_duration_seconds.clone(),
        );
        registry.register(
            "chunks_loader_batches",
            "Chunk-set batches produced by the loader stage, by outcome",
            loader_batches_total.clone(),
        );
        registry.register(
            "chunks_loader_chunk_bytes",
            "Total bytes of chunk payload loaded",
            loader_chunk_bytes_total.clone(),
        );

        Self {
            cache_requests_total,
            cache_hits_total,
            iterator_duration_seconds,
            loader_batches_total,
            loader_chunk_bytes_total,
        }
    }

    pub fn record_cache_request(&self, cache_name: &str, requests: usize, hits: usize) {
        self.cache_requests_total
            .get_or_create(&CacheLabels {
                name: cache_name.to_owned(),
            })
            .inc_by(requests as u64);
        self.cache_hits_total
            .get_or_create(&CacheLabels {
                name: cache_name.to_owned(),
            })
            .inc_by(hits as u64);
    }

    pub fn observe_iterator_duration(&self, stage: IteratorStage, seconds: f64) {
        self.iterator_duration_seconds
            .get_or_create(&StageLabels { stage })
            .observe(seconds);
    }

    pub fn record_loader_batch(&self, outcome: BatchOutcome, chunk_bytes: u64) {
        self.loader_batches_total
            .get_or_create(&BatchLabels { outcome })
            .inc();
        self.loader_chunk_bytes_total.inc_by(chunk_bytes);
    }
}
