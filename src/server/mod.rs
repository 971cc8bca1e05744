use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analytics::{AnalyticsDispatcher, UsageReport, UsageStatsRecorder};
use crate::cache::{CacheManager, CacheStats, CacheStore, MemoryCacheStore, RedisCacheStore};
use crate::config::Config;
use crate::error::{OutcomeKind, SearchError, SearchResult, ValidationError};
use crate::observability::{HealthReport, HealthService, Liveness, LoggingService, MetricsRegistry};
use crate::search::SearchService;
use crate::types::SearchResponse;
use crate::upstream::SerpApiClient;

/// How often the in-process cache drops expired entries
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Main search server structure
pub struct SearchServer {
    app: Router,
    config: Config,
    background: Vec<JoinHandle<()>>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub search_service: Arc<SearchService>,
    pub usage: Arc<UsageStatsRecorder>,
    pub health: HealthService,
    pub logging: LoggingService,
}

impl AppState {
    pub fn new(search_service: Arc<SearchService>, usage: Arc<UsageStatsRecorder>) -> Self {
        Self {
            search_service,
            usage,
            health: HealthService::new(),
            logging: LoggingService::new(),
        }
    }
}

impl SearchServer {
    /// Create a new search server instance
    pub async fn new(config: Config) -> SearchResult<Self> {
        info!("Initializing search server components...");
        config.validate()?;

        let metrics = MetricsRegistry::new()?;
        let mut background = Vec::new();

        // Redis when configured, otherwise the in-process store
        let store: Arc<dyn CacheStore> = match &config.cache.redis_url {
            Some(_) => Arc::new(RedisCacheStore::connect(&config.cache).await?),
            None => {
                info!("REDIS_URL not set, using in-process cache");
                let memory = Arc::new(MemoryCacheStore::new(config.cache.max_entries));
                background.push(memory.spawn_sweeper(SWEEP_INTERVAL));
                memory
            }
        };
        let cache = Arc::new(CacheManager::new(store, config.pipeline.cache_ttl()));

        let upstream = Arc::new(SerpApiClient::new(config.upstream.clone(), &config.pipeline)?);

        let usage = Arc::new(
            UsageStatsRecorder::default().with_max_tracked_queries(config.analytics.max_tracked_queries),
        );
        let (analytics, worker) = AnalyticsDispatcher::spawn(usage.clone(), config.analytics.queue_capacity);
        background.push(worker);

        let search_service = Arc::new(SearchService::new(
            upstream,
            cache,
            analytics,
            metrics,
            config.pipeline.clone(),
        ));

        let state = Arc::new(AppState::new(search_service, usage));

        info!("Search server initialized successfully");
        Ok(SearchServer {
            app: router(state),
            config,
            background,
        })
    }

    /// Serve HTTP until ctrl-c
    pub async fn run(self) -> SearchResult<()> {
        let bind_addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| SearchError::ConfigError(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        info!("HTTP server listening on {}", bind_addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| SearchError::Internal(format!("Server error: {}", e)))?;

        for task in self.background {
            task.abort();
        }
        info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

/// Build the HTTP router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/api/products/search", get(search_handler))
        .route("/api/health", get(api_health_handler))
        .route("/api/stats", get(stats_handler))
        .route("/health", get(liveness_handler))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(security_middleware))
        .layer(cors)
        .with_state(state)
}

/// Middleware for security headers
async fn security_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("X-XSS-Protection", HeaderValue::from_static("1; mode=block"));
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'self'; script-src 'none'; object-src 'none'"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}

/// Raw query string; `limit` is parsed by hand so bad input maps to 400
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<String>,
}

fn parse_limit(raw: Option<&str>) -> SearchResult<Option<u32>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<u32>().map(Some).map_err(|_| {
            SearchError::from(ValidationError::InvalidLimit(format!(
                "limit must be a positive integer, got \"{}\"",
                value
            )))
        }),
    }
}

/// Handler for product search
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let trace_id = Uuid::new_v4();
    let query = params.q.unwrap_or_default();

    let limit = parse_limit(params.limit.as_deref()).map_err(|e| ApiError::new(e, &query))?;
    state.logging.log_search_request(trace_id, &query, limit);

    match state.search_service.search(&query, limit).await {
        Ok(response) => {
            state
                .logging
                .log_search_response(trace_id, response.response_time_ms, response.count, response.cached);
            Ok(Json(response))
        }
        Err(e) => {
            state.logging.log_error(trace_id, &e, None);
            Err(ApiError::new(e, &query))
        }
    }
}

/// Handler for the component health report
async fn api_health_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let service = &state.search_service;
    let report = state
        .health
        .check(service.cache(), service.upstream(), service.analytics())
        .await;

    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        warn!("Health check degraded: {:?}", report.components);
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Cache section of the stats report
#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub backend: String,
    pub ttl_seconds: u64,
    pub hit_ratio: f64,
    #[serde(flatten)]
    pub stats: CacheStats,
}

impl CacheReport {
    fn from_manager(cache: &CacheManager) -> Self {
        let stats = cache.stats();
        Self {
            backend: cache.backend().to_string(),
            ttl_seconds: cache.ttl().as_secs(),
            hit_ratio: stats.hit_ratio(),
            stats,
        }
    }
}

/// Body of `/api/stats`
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub usage: UsageReport,
    pub cache: CacheReport,
    pub analytics_events_dropped: u64,
}

/// Handler for usage statistics
async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let usage = state.usage.report(chrono::Utc::now().date_naive()).await;
    let service = &state.search_service;

    Json(StatsResponse {
        usage,
        cache: CacheReport::from_manager(service.cache()),
        analytics_events_dropped: service.analytics().dropped(),
    })
}

/// Handler for liveness probes
async fn liveness_handler(State(state): State<Arc<AppState>>) -> Json<Liveness> {
    Json(state.health.liveness())
}

/// Handler for Prometheus scraping
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.search_service.metrics().gather() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Error response structure shared by every failed search
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub response_time_ms: u64,
}

/// Search failure on its way to the client
#[derive(Debug)]
pub struct ApiError {
    error: SearchError,
    query: Option<String>,
}

impl ApiError {
    fn new(error: SearchError, query: &str) -> Self {
        let query = query.trim();
        Self {
            error,
            query: (!query.is_empty()).then(|| query.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self.error.outcome_kind() {
            OutcomeKind::ClientError => {
                let message = match &self.error {
                    SearchError::InvalidRequest(detail) => detail.clone(),
                    other => other.to_string(),
                };
                (StatusCode::BAD_REQUEST, "Invalid request", message)
            }
            OutcomeKind::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Search service temporarily unavailable",
                self.error.to_string(),
            ),
            OutcomeKind::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "An unexpected error occurred while processing your request".to_string(),
            ),
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
            query: self.query,
            results: Vec::new(),
            count: 0,
            cached: false,
            response_time_ms: 0,
        };
        (status, Json(body)).into_response()
    }
}
