use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use crate::error::{SearchError, SearchResult};

/// Prometheus metrics registry and collectors
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

/// All application metrics
pub struct Metrics {
    // Search metrics
    pub search_requests_total: Counter,
    pub search_errors_total: Counter,
    pub search_duration_seconds: Histogram,
    pub search_results_returned: Histogram,

    // Cache metrics
    pub cache_hits_total: Counter,
    pub cache_misses_total: Counter,

    // Upstream metrics
    pub upstream_requests_total: Counter,
    pub upstream_failures_total: Counter,

    // Analytics metrics
    pub analytics_events_dropped_total: Counter,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all collectors
    pub fn new() -> SearchResult<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry)?);

        Ok(Self { registry, metrics })
    }

    /// Get metrics in Prometheus text format
    pub fn gather(&self) -> SearchResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| SearchError::Internal(format!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer)
            .map_err(|e| SearchError::Internal(format!("Failed to convert metrics to string: {}", e)))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> SearchResult<Counter> {
    let counter = Counter::new(name, help)
        .map_err(|e| SearchError::Internal(format!("Failed to create {} metric: {}", name, e)))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| SearchError::Internal(format!("Failed to register {}: {}", name, e)))?;
    Ok(counter)
}

fn histogram(registry: &Registry, name: &str, help: &str, buckets: Vec<f64>) -> SearchResult<Histogram> {
    let histogram = Histogram::with_opts(HistogramOpts::new(name, help).buckets(buckets))
        .map_err(|e| SearchError::Internal(format!("Failed to create {} metric: {}", name, e)))?;
    registry
        .register(Box::new(histogram.clone()))
        .map_err(|e| SearchError::Internal(format!("Failed to register {}: {}", name, e)))?;
    Ok(histogram)
}

impl Metrics {
    fn new(registry: &Registry) -> SearchResult<Self> {
        Ok(Self {
            search_requests_total: counter(
                registry,
                "search_requests_total",
                "Total number of search requests processed",
            )?,
            search_errors_total: counter(registry, "search_errors_total", "Total number of failed searches")?,
            search_duration_seconds: histogram(
                registry,
                "search_duration_seconds",
                "Duration of search requests in seconds",
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )?,
            search_results_returned: histogram(
                registry,
                "search_results_returned",
                "Number of product records returned per search",
                vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0, 100.0],
            )?,
            cache_hits_total: counter(registry, "cache_hits_total", "Total number of cache hits")?,
            cache_misses_total: counter(registry, "cache_misses_total", "Total number of cache misses")?,
            upstream_requests_total: counter(
                registry,
                "upstream_requests_total",
                "Total number of upstream provider fetches",
            )?,
            upstream_failures_total: counter(
                registry,
                "upstream_failures_total",
                "Total number of upstream fetches that failed after retries",
            )?,
            analytics_events_dropped_total: counter(
                registry,
                "analytics_events_dropped_total",
                "Total number of analytics events dropped by a full or closed queue",
            )?,
        })
    }
}

/// Timer helper for measuring durations
pub struct Timer {
    start: Instant,
    histogram: Histogram,
}

impl Timer {
    pub fn new(histogram: Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    pub fn observe(self) {
        let duration = self.start.elapsed();
        self.histogram.observe(duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry_creation() {
        let registry = MetricsRegistry::new().unwrap();
        assert!(registry.gather().is_ok());
    }

    #[test]
    fn test_metrics_collection() {
        let registry = MetricsRegistry::new().unwrap();

        registry.metrics.search_requests_total.inc();
        registry.metrics.cache_hits_total.inc();
        registry.metrics.analytics_events_dropped_total.inc();
        registry.metrics.search_results_returned.observe(20.0);

        let output = registry.gather().unwrap();
        assert!(output.contains("search_requests_total 1"));
        assert!(output.contains("cache_hits_total 1"));
        assert!(output.contains("analytics_events_dropped_total 1"));
        assert!(output.contains("search_results_returned_count 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = MetricsRegistry::new().unwrap();
        let second = MetricsRegistry::new().unwrap();

        first.metrics.upstream_failures_total.inc();

        assert_eq!(first.metrics.upstream_failures_total.get(), 1.0);
        assert_eq!(second.metrics.upstream_failures_total.get(), 0.0);
    }

    #[test]
    fn test_timer_functionality() {
        let registry = MetricsRegistry::new().unwrap();
        let timer = Timer::new(registry.metrics.search_duration_seconds.clone());

        std::thread::sleep(std::time::Duration::from_millis(1));
        timer.observe();

        assert_eq!(registry.metrics.search_duration_seconds.get_sample_count(), 1);
    }
}
