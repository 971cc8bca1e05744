use crate::cache::CacheStore;
use crate::config::CacheConfig;
use crate::error::{SearchError, SearchResult};
use crate::types::CachedSearch;
use async_trait::async_trait;
use fred::{
    clients::RedisPool,
    interfaces::{ClientLike, KeysInterface},
    types::{Builder, Expiration, RedisConfig as FredRedisConfig},
};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info};

/// Redis-backed cache store with connection pooling
pub struct RedisCacheStore {
    /// Fred Redis client with connection pooling
    client: RedisPool,
    /// Per-command deadline
    command_timeout: Duration,
}

impl RedisCacheStore {
    /// Connect to Redis using the cache configuration
    pub async fn connect(config: &CacheConfig) -> SearchResult<Self> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| SearchError::ConfigError("REDIS_URL is not set".to_string()))?;

        info!("Initializing Redis cache store");

        let redis_config = FredRedisConfig::from_url(url)
            .map_err(|e| SearchError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let timeout_secs = config.connection_timeout_secs;
        let client = Builder::from_config(redis_config)
            .with_connection_config(|conn_config| {
                conn_config.connection_timeout = Duration::from_secs(timeout_secs);
            })
            .with_performance_config(|perf_config| {
                perf_config.auto_pipeline = true;
                perf_config.default_command_timeout = Duration::from_secs(timeout_secs);
            })
            .build_pool(config.max_connections as usize)
            .map_err(|e| SearchError::CacheUnavailable(format!("Failed to create Redis pool: {}", e)))?;

        let _connection_task = client.connect();
        client
            .wait_for_connect()
            .await
            .map_err(|e| SearchError::CacheUnavailable(format!("Redis connection failed: {}", e)))?;

        info!("Redis cache store connected");

        Ok(Self {
            client,
            command_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> SearchResult<Option<CachedSearch>> {
        let result: Option<String> = self
            .client
            .get(key)
            .await
            .map_err(|e| SearchError::CacheUnavailable(format!("Failed to read {}: {}", key, e)))?;

        match result {
            Some(serialized) => {
                // Undecodable entries surface as errors; the manager counts them as misses
                let entry = serde_json::from_str(&serialized)
                    .map_err(|e| SearchError::CacheUnavailable(format!("Corrupt cache entry {}: {}", key, e)))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &CachedSearch, ttl: Duration) -> SearchResult<()> {
        let serialized = serde_json::to_string(value)?;
        let ttl_secs = ttl.as_secs().max(1) as i64;

        debug!("Writing {} bytes to Redis key {} (ttl {}s)", serialized.len(), key, ttl_secs);

        let _: () = self
            .client
            .set(key, serialized, Some(Expiration::EX(ttl_secs)), None, false)
            .await
            .map_err(|e| SearchError::CacheUnavailable(format!("Failed to write {}: {}", key, e)))?;

        Ok(())
    }

    async fn health_check(&self) -> SearchResult<()> {
        let start = std::time::Instant::now();

        match timeout(self.command_timeout, self.client.ping::<String>()).await {
            Ok(Ok(_)) => {
                debug!("Redis health check passed in {:?}", start.elapsed());
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Redis health check failed: {}", e);
                Err(SearchError::CacheUnavailable(format!("Health check failed: {}", e)))
            }
            Err(_) => {
                error!("Redis health check timed out");
                Err(SearchError::CacheUnavailable("Health check timed out".to_string()))
            }
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
