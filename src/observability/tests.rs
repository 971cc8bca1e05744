use super::*;
use crate::analytics::{AnalyticsDispatcher, UsageStatsRecorder};
use crate::cache::{CacheManager, CacheStore, MemoryCacheStore};
use crate::error::{SearchError, SearchResult};
use crate::types::CachedSearch;
use crate::upstream::{RawShoppingPayload, UpstreamProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

struct StaticProvider;

#[async_trait]
impl UpstreamProvider for StaticProvider {
    async fn fetch(&self, _query: &str, _limit: u32) -> SearchResult<RawShoppingPayload> {
        Ok(RawShoppingPayload::default())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

struct DownStore;

#[async_trait]
impl CacheStore for DownStore {
    async fn get(&self, _key: &str) -> SearchResult<Option<CachedSearch>> {
        Err(SearchError::CacheUnavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: &CachedSearch, _ttl: Duration) -> SearchResult<()> {
        Err(SearchError::CacheUnavailable("connection refused".to_string()))
    }

    async fn health_check(&self) -> SearchResult<()> {
        Err(SearchError::CacheUnavailable("connection refused".to_string()))
    }

    fn backend(&self) -> &'static str {
        "down"
    }
}

fn dispatcher() -> AnalyticsDispatcher {
    let (dispatcher, _worker) = AnalyticsDispatcher::spawn(Arc::new(UsageStatsRecorder::default()), 16);
    dispatcher
}

#[tokio::test]
async fn test_health_report_all_components_healthy() {
    let cache = CacheManager::new(Arc::new(MemoryCacheStore::new(16)), Duration::from_secs(60));
    let report = HealthService::new().check(&cache, &StaticProvider, &dispatcher()).await;

    assert!(report.is_healthy());
    assert_eq!(report.components.len(), 3);
    assert_eq!(report.components["cache"].status, HealthStatus::Healthy);
    assert!(report.components["cache"].response_time_ms.is_some());
    assert!(report.components["upstream"]
        .message
        .as_deref()
        .is_some_and(|m| m.contains("static")));
}

#[tokio::test]
async fn test_cache_outage_degrades_report() {
    let cache = CacheManager::new(Arc::new(DownStore), Duration::from_secs(60));
    let report = HealthService::new().check(&cache, &StaticProvider, &dispatcher()).await;

    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.components["cache"].status, HealthStatus::Unhealthy);
    assert_eq!(report.components["analytics"].status, HealthStatus::Healthy);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["service"], crate::types::SERVICE_NAME);
}

#[tokio::test]
async fn test_closed_analytics_queue_degrades_report() {
    let (analytics, worker) = AnalyticsDispatcher::spawn(Arc::new(UsageStatsRecorder::default()), 16);
    worker.abort();
    let _ = worker.await;

    let cache = CacheManager::new(Arc::new(MemoryCacheStore::new(16)), Duration::from_secs(60));
    let report = HealthService::new().check(&cache, &StaticProvider, &analytics).await;

    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.components["analytics"].status, HealthStatus::Unhealthy);
}

#[test]
fn test_metrics_exposition_after_search_activity() {
    let registry = MetricsRegistry::new().unwrap();

    registry.metrics.search_requests_total.inc();
    registry.metrics.cache_misses_total.inc();
    registry.metrics.upstream_requests_total.inc();
    registry.metrics.search_results_returned.observe(12.0);
    let timer = Timer::new(registry.metrics.search_duration_seconds.clone());
    timer.observe();

    let output = registry.gather().unwrap();
    for name in [
        "search_requests_total",
        "search_errors_total",
        "cache_hits_total",
        "cache_misses_total",
        "upstream_requests_total",
        "upstream_failures_total",
        "analytics_events_dropped_total",
        "search_duration_seconds",
        "search_results_returned",
    ] {
        assert!(output.contains(name), "missing metric {}", name);
    }
}
