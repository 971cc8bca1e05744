use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{SearchError, SearchResult};

/// Hard ceiling on results per request imposed by the provider
pub const PROVIDER_MAX_RESULTS: u32 = 100;

/// Largest accepted retry budget per request
pub const MAX_RETRY_COUNT: u32 = 5;

/// Largest accepted base delay between retries
pub const MAX_RETRY_BASE_DELAY_MS: u64 = 5_000;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Upstream provider configuration
    pub upstream: UpstreamConfig,
    /// Cache backend configuration
    pub cache: CacheConfig,
    /// Options that shape the fetch/normalize/cache pipeline
    pub pipeline: PipelineConfig,
    /// Analytics configuration
    pub analytics: AnalyticsConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

/// Upstream shopping provider configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Provider API key
    pub api_key: String,
    /// Search endpoint
    pub base_url: String,
    /// Country code sent as `gl`
    pub country: String,
    /// Language code sent as `hl`
    pub language: String,
    /// Base delay for exponential backoff between retries
    pub retry_base_delay_ms: u64,
    /// User agent for outgoing requests
    pub user_agent: String,
}

/// Cache backend configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis connection URL; the in-process store is used when unset
    pub redis_url: Option<String>,
    /// Maximum Redis connections
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// Entry cap for the in-process store
    pub max_entries: usize,
}

/// The recognized pipeline options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Per-attempt deadline for the upstream call
    pub upstream_timeout_ms: u64,
    /// Retries after the first attempt for transient upstream failures
    pub retry_count: u32,
    /// Lifetime of a cache entry
    pub cache_ttl_seconds: u64,
    /// Limit used when the caller does not pass one
    pub default_limit: u32,
    /// Largest accepted limit
    pub max_limit: u32,
}

/// Analytics configuration
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Bounded queue between request handlers and the analytics worker
    pub queue_capacity: usize,
    /// Distinct queries kept for popularity ranking
    pub max_tracked_queries: usize,
}

impl PipelineConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    fn validate(&self) -> SearchResult<()> {
        if self.upstream_timeout_ms == 0 {
            return Err(SearchError::ConfigError("Upstream timeout must be greater than 0".to_string()));
        }

        if self.retry_count > MAX_RETRY_COUNT {
            return Err(SearchError::ConfigError(format!(
                "SERPAPI_RETRY_COUNT must be at most {}",
                MAX_RETRY_COUNT
            )));
        }

        if self.cache_ttl_seconds == 0 {
            return Err(SearchError::ConfigError("Cache TTL must be greater than 0".to_string()));
        }

        if self.max_limit == 0 || self.max_limit > PROVIDER_MAX_RESULTS {
            return Err(SearchError::ConfigError(format!(
                "MAX_LIMIT must be between 1 and {}",
                PROVIDER_MAX_RESULTS
            )));
        }

        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(SearchError::ConfigError(
                "DEFAULT_LIMIT must be between 1 and MAX_LIMIT".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upstream_timeout_ms: 10_000,
            retry_count: 2,
            cache_ttl_seconds: 3600, // 1 hour
            default_limit: 20,
            max_limit: PROVIDER_MAX_RESULTS,
        }
    }
}

/// Read an environment variable, falling back to `default` when unset
fn env_or<T>(name: &str, default: T) -> SearchResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| SearchError::ConfigError(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> SearchResult<Self> {
        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("Could not load .env file: {}", e);
        }

        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env_or("SERVER_PORT", defaults.server.port)?,
            },
            upstream: UpstreamConfig {
                api_key: env::var("SERPAPI_KEY")
                    .map_err(|_| SearchError::ConfigError("SERPAPI_KEY is required".to_string()))?,
                base_url: env::var("SERPAPI_BASE_URL").unwrap_or(defaults.upstream.base_url),
                country: env::var("SERPAPI_COUNTRY").unwrap_or(defaults.upstream.country),
                language: env::var("SERPAPI_LANGUAGE").unwrap_or(defaults.upstream.language),
                retry_base_delay_ms: env_or(
                    "SERPAPI_RETRY_BASE_DELAY_MS",
                    defaults.upstream.retry_base_delay_ms,
                )?,
                user_agent: defaults.upstream.user_agent,
            },
            cache: CacheConfig {
                redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
                max_connections: env_or("REDIS_MAX_CONNECTIONS", defaults.cache.max_connections)?,
                connection_timeout_secs: env_or(
                    "REDIS_CONNECTION_TIMEOUT_SECS",
                    defaults.cache.connection_timeout_secs,
                )?,
                max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache.max_entries)?,
            },
            pipeline: PipelineConfig {
                upstream_timeout_ms: env_or("SERPAPI_TIMEOUT_MS", defaults.pipeline.upstream_timeout_ms)?,
                retry_count: env_or("SERPAPI_RETRY_COUNT", defaults.pipeline.retry_count)?,
                cache_ttl_seconds: env_or("CACHE_TTL_SECS", defaults.pipeline.cache_ttl_seconds)?,
                default_limit: env_or("DEFAULT_LIMIT", defaults.pipeline.default_limit)?,
                max_limit: env_or("MAX_LIMIT", defaults.pipeline.max_limit)?,
            },
            analytics: AnalyticsConfig {
                queue_capacity: env_or("ANALYTICS_QUEUE_CAPACITY", defaults.analytics.queue_capacity)?,
                max_tracked_queries: env_or(
                    "ANALYTICS_MAX_TRACKED_QUERIES",
                    defaults.analytics.max_tracked_queries,
                )?,
            },
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> SearchResult<()> {
        if self.server.port == 0 {
            return Err(SearchError::ConfigError("Server port cannot be 0".to_string()));
        }

        if self.upstream.api_key.trim().is_empty() {
            return Err(SearchError::ConfigError("SERPAPI_KEY cannot be empty".to_string()));
        }

        if !self.upstream.base_url.starts_with("https://") && !self.upstream.base_url.starts_with("http://") {
            return Err(SearchError::ConfigError(
                "SERPAPI_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        if self.upstream.retry_base_delay_ms > MAX_RETRY_BASE_DELAY_MS {
            return Err(SearchError::ConfigError(format!(
                "SERPAPI_RETRY_BASE_DELAY_MS must be at most {}",
                MAX_RETRY_BASE_DELAY_MS
            )));
        }

        if let Some(url) = &self.cache.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(SearchError::ConfigError(
                    "REDIS_URL must start with redis:// or rediss://".to_string(),
                ));
            }
        }

        if self.cache.max_entries == 0 {
            return Err(SearchError::ConfigError("CACHE_MAX_ENTRIES must be greater than 0".to_string()));
        }

        if self.analytics.queue_capacity == 0 {
            return Err(SearchError::ConfigError(
                "ANALYTICS_QUEUE_CAPACITY must be greater than 0".to_string(),
            ));
        }

        if self.analytics.max_tracked_queries == 0 {
            return Err(SearchError::ConfigError(
                "ANALYTICS_MAX_TRACKED_QUERIES must be greater than 0".to_string(),
            ));
        }

        self.pipeline.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            upstream: UpstreamConfig {
                api_key: "".to_string(),
                base_url: "https://serpapi.com/search.json".to_string(),
                country: "us".to_string(),
                language: "en".to_string(),
                retry_base_delay_ms: 200,
                user_agent: format!("Smart-Shopper-Assistant/{}", env!("CARGO_PKG_VERSION")),
            },
            cache: CacheConfig {
                redis_url: None,
                max_connections: 10,
                connection_timeout_secs: 5,
                max_entries: 10_000,
            },
            pipeline: PipelineConfig::default(),
            analytics: AnalyticsConfig {
                queue_capacity: 1024,
                max_tracked_queries: 10_000,
            },
        }
    }
}
