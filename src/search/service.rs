/// Search orchestrator
///
/// Owns the request lifecycle: validate, consult the cache, fetch and
/// normalize on a miss, write back, and emit one analytics event. It is the
/// only component that decides between cache and upstream.

use crate::analytics::AnalyticsDispatcher;
use crate::cache::CacheManager;
use crate::config::PipelineConfig;
use crate::error::{SearchError, SearchResult};
use crate::observability::{MetricsRegistry, Timer};
use crate::search::normalizer::Normalizer;
use crate::types::{
    AnalyticsEvent, CachedSearch, RequestOutcome, SearchOutcome, SearchRequest, SearchResponse,
};
use crate::upstream::UpstreamProvider;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

/// Fetch–normalize–cache pipeline
pub struct SearchService {
    upstream: Arc<dyn UpstreamProvider>,
    cache: Arc<CacheManager>,
    normalizer: Normalizer,
    analytics: AnalyticsDispatcher,
    metrics: MetricsRegistry,
    config: PipelineConfig,
}

impl SearchService {
    /// Create a new search service
    pub fn new(
        upstream: Arc<dyn UpstreamProvider>,
        cache: Arc<CacheManager>,
        analytics: AnalyticsDispatcher,
        metrics: MetricsRegistry,
        config: PipelineConfig,
    ) -> Self {
        Self {
            upstream,
            cache,
            normalizer: Normalizer::new(),
            analytics,
            metrics,
            config,
        }
    }

    /// Run one search and build the response envelope
    pub async fn search(&self, query: &str, limit: Option<u32>) -> SearchResult<SearchResponse> {
        let request = self.validate(query, limit)?;
        let outcome = self.execute(&request).await?;
        Ok(SearchResponse::from_outcome(&request, outcome))
    }

    /// Run one search, returning records and cache provenance
    pub async fn handle(&self, query: &str, limit: Option<u32>) -> SearchResult<SearchOutcome> {
        let request = self.validate(query, limit)?;
        self.execute(&request).await
    }

    fn validate(&self, query: &str, limit: Option<u32>) -> SearchResult<SearchRequest> {
        self.metrics.metrics.search_requests_total.inc();
        SearchRequest::validated(query, limit, self.config.default_limit, self.config.max_limit).map_err(|e| {
            self.metrics.metrics.search_errors_total.inc();
            debug!("Rejected search request: {}", e);
            e
        })
    }

    #[instrument(skip(self, request), fields(
        query_len = request.query.len(),
        limit = request.limit,
        provider = self.upstream.name()
    ))]
    async fn execute(&self, request: &SearchRequest) -> SearchResult<SearchOutcome> {
        let start = Instant::now();
        let timer = Timer::new(self.metrics.metrics.search_duration_seconds.clone());
        let key = CacheManager::generate_query_key(&request.query, request.limit);

        // Step 1: cache lookup; backend failures already count as misses
        if let Some(entry) = self.cache.lookup(&key).await {
            self.metrics.metrics.cache_hits_total.inc();
            let mut records = entry.results;
            records.truncate(request.limit as usize);

            let latency_ms = elapsed_ms(start);
            self.emit(AnalyticsEvent::success(&request.query, true, records.len(), latency_ms));
            self.metrics.metrics.search_results_returned.observe(records.len() as f64);
            timer.observe();

            info!("Served {} results from cache in {} ms", records.len(), latency_ms);
            return Ok(SearchOutcome {
                records,
                cached: true,
                latency_ms,
            });
        }
        self.metrics.metrics.cache_misses_total.inc();

        // Step 2: live fetch with the caller's trimmed query
        self.metrics.metrics.upstream_requests_total.inc();
        let payload = match self.upstream.fetch(&request.query, request.limit).await {
            Ok(payload) => payload,
            Err(e) => {
                let latency_ms = elapsed_ms(start);
                self.metrics.metrics.upstream_failures_total.inc();
                self.metrics.metrics.search_errors_total.inc();
                timer.observe();

                let outcome = match e {
                    SearchError::UpstreamTimeout(_) => RequestOutcome::Timeout,
                    _ => RequestOutcome::Failed,
                };
                self.emit(AnalyticsEvent::failure(&request.query, outcome, latency_ms));

                error!("Upstream {} failed after {} ms: {}", self.upstream.name(), latency_ms, e);
                return Err(SearchError::UpstreamUnavailable(e.to_string()));
            }
        };

        // Step 3: normalize, then cut to the requested size
        let mut records = self.normalizer.normalize(&payload);
        records.truncate(request.limit as usize);
        let latency_ms = elapsed_ms(start);

        // Step 4: single write once the result set is final
        let entry = CachedSearch {
            query: request.query.clone(),
            results: records.clone(),
            cached_at: Utc::now(),
            response_time_ms: latency_ms,
        };
        self.cache.store(&key, &entry).await;

        self.emit(AnalyticsEvent::success(&request.query, false, records.len(), latency_ms));
        self.metrics.metrics.search_results_returned.observe(records.len() as f64);
        timer.observe();

        info!(
            "Fetched {} results from {} in {} ms",
            records.len(),
            self.upstream.name(),
            latency_ms
        );
        Ok(SearchOutcome {
            records,
            cached: false,
            latency_ms,
        })
    }

    fn emit(&self, event: AnalyticsEvent) {
        if !self.analytics.dispatch(event) {
            self.metrics.metrics.analytics_events_dropped_total.inc();
        }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn upstream(&self) -> &dyn UpstreamProvider {
        self.upstream.as_ref()
    }

    pub fn analytics(&self) -> &AnalyticsDispatcher {
        &self.analytics
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
