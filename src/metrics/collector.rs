use prometheus::proto::MetricFamily;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Request counters for one pipeline instance.
///
/// Each collector owns its registry rather than registering into the
/// process-wide default, so independently configured pipelines can coexist
/// (and be asserted on) within one process.
pub struct MetricsCollector {
    registry: Registry,
    total: IntCounter,
    allowed: IntCounter,
    blocked: IntCounterVec,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    scorer_errors: IntCounterVec,
    internal_faults: IntCounter,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let registry = Registry::new();

        let total = IntCounter::new("microshield_total_requests", "Total classified requests")
            .expect("metric creation failed");
        let allowed = IntCounter::new("microshield_allowed_requests", "Allowed requests")
            .expect("metric creation failed");
        let blocked = IntCounterVec::new(
            Opts::new("microshield_blocked_requests", "Blocked requests"),
            &["reason"],
        )
        .expect("metric creation failed");
        let cache_hits = IntCounter::new("microshield_cache_hits", "Verdict cache hits")
            .expect("metric creation failed");
        let cache_misses = IntCounter::new("microshield_cache_misses", "Verdict cache misses")
            .expect("metric creation failed");
        let scorer_errors = IntCounterVec::new(
            Opts::new("microshield_scorer_errors", "External scorer failures"),
            &["kind"],
        )
        .expect("metric creation failed");
        let internal_faults = IntCounter::new(
            "microshield_internal_faults",
            "Pipeline faults resolved as fail-open",
        )
        .expect("metric creation failed");

        registry
            .register(Box::new(total.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(allowed.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(blocked.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(cache_hits.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(cache_misses.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(scorer_errors.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(internal_faults.clone()))
            .expect("metric registration failed");

        Self {
            registry,
            total,
            allowed,
            blocked,
            cache_hits,
            cache_misses,
            scorer_errors,
            internal_faults,
        }
    }

    pub fn record_allowed(&self) {
        self.total.inc();
        self.allowed.inc();
    }

    pub fn record_blocked(&self, reason: &str) {
        self.total.inc();
        self.blocked.with_label_values(&[reason]).inc();
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.inc();
    }

    pub fn record_scorer_error(&self, kind: &str) {
        self.scorer_errors.with_label_values(&[kind]).inc();
    }

    pub fn record_internal_fault(&self) {
        self.internal_faults.inc();
        self.record_allowed();
    }

    /// Snapshot for the host's scrape endpoint.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    pub fn allowed_count(&self) -> u64 {
        self.allowed.get()
    }

    pub fn blocked_count(&self, reason: &str) -> u64 {
        self.blocked.with_label_values(&[reason]).get()
    }

    pub fn cache_hit_count(&self) -> u64 {
        self.cache_hits.get()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
