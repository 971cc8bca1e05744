/// SerpAPI Google Shopping client
///
/// Every attempt runs under a hard deadline. Transient failures (timeouts,
/// transport errors and 5xx) are retried with exponential backoff; anything
/// else fails on the first response.

use crate::config::{PipelineConfig, UpstreamConfig, PROVIDER_MAX_RESULTS};
use crate::error::{SearchError, SearchResult};
use crate::search::retry::{RetryConfig, RetryExecutor};
use crate::upstream::{RawShoppingPayload, UpstreamProvider};
use async_trait::async_trait;
use reqwest::header;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info};

/// Upper bound on backoff between two attempts
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Connection pool size kept per host
const MAX_IDLE_CONNECTIONS: usize = 5;

/// SerpAPI client with connection pooling, deadlines and bounded retries
#[derive(Debug, Clone)]
pub struct SerpApiClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    attempt_timeout: Duration,
    retry: RetryExecutor,
}

impl SerpApiClient {
    /// Create a new client from provider settings and pipeline options
    pub fn new(config: UpstreamConfig, pipeline: &PipelineConfig) -> SearchResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SearchError::ConfigError("SERPAPI_KEY cannot be empty".to_string()));
        }

        let attempt_timeout = pipeline.upstream_timeout();

        let http = reqwest::Client::builder()
            .timeout(attempt_timeout)
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SearchError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let base_delay = Duration::from_millis(config.retry_base_delay_ms);
        let retry = RetryExecutor::with_config(RetryConfig {
            max_retries: pipeline.retry_count,
            base_delay,
            max_delay: MAX_RETRY_DELAY.max(base_delay),
            jitter_factor: 0.1,
        });

        Ok(Self {
            http,
            config,
            attempt_timeout,
            retry,
        })
    }

    /// Maximum number of HTTP attempts per fetch
    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts()
    }

    /// One attempt under the hard deadline
    async fn fetch_once(&self, query: &str, limit: u32) -> SearchResult<RawShoppingPayload> {
        let timeout_ms = self.attempt_timeout.as_millis() as u64;
        match timeout(self.attempt_timeout, self.send_request(query, limit)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::UpstreamTimeout(timeout_ms)),
        }
    }

    async fn send_request(&self, query: &str, limit: u32) -> SearchResult<RawShoppingPayload> {
        let start = Instant::now();
        let num = limit.min(PROVIDER_MAX_RESULTS).to_string();
        let params = [
            ("engine", "google_shopping"),
            ("q", query),
            ("api_key", self.config.api_key.as_str()),
            ("num", num.as_str()),
            ("gl", self.config.country.as_str()),
            ("hl", self.config.language.as_str()),
        ];

        let response = self
            .http
            .get(&self.config.base_url)
            .header(header::ACCEPT, "application/json")
            .query(&params)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        debug!("Provider response status: {}", status);

        if !status.is_success() {
            return Err(SearchError::upstream_status(
                status.as_u16(),
                format!("Provider returned HTTP {}", status.as_u16()),
            ));
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| SearchError::upstream_rejected(format!("Malformed provider payload: {}", e)))?;

        let payload = RawShoppingPayload::from_value(body)?;
        debug!(
            "Provider answered in {:?} with {} raw items",
            start.elapsed(),
            payload.items.len()
        );
        Ok(payload)
    }

    /// Map transport errors; URLs are stripped because they carry the API key
    fn classify(&self, error: reqwest::Error) -> SearchError {
        if error.is_timeout() {
            SearchError::UpstreamTimeout(self.attempt_timeout.as_millis() as u64)
        } else {
            SearchError::upstream_transport(format!("Provider request failed: {}", error.without_url()))
        }
    }
}

#[async_trait]
impl UpstreamProvider for SerpApiClient {
    async fn fetch(&self, query: &str, limit: u32) -> SearchResult<RawShoppingPayload> {
        info!("Making provider request (limit {})", limit);
        self.retry.execute(|| self.fetch_once(query, limit)).await
    }

    fn name(&self) -> &'static str {
        "serpapi"
    }
}
