/// Caching module
///
/// Search results are cached per (normalized query, limit) with a TTL:
/// - `CacheStore` is the backend capability (in-process or Redis)
/// - `CacheManager` builds keys, tracks hit/miss statistics and absorbs
///   backend failures so the pipeline degrades to a live fetch

pub mod memory;
pub mod redis_client;


pub use memory::MemoryCacheStore;
pub use redis_client::RedisCacheStore;

use crate::error::SearchResult;
use crate::observability::LoggingService;
use crate::types::CachedSearch;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix shared by every search cache key
const KEY_PREFIX: &str = "shopping:search:v1";

/// Key/value backend with per-entry expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry; `None` when missing or expired
    async fn get(&self, key: &str) -> SearchResult<Option<CachedSearch>>;

    /// Store an entry, replacing any previous value for the key
    async fn set(&self, key: &str, value: &CachedSearch, ttl: Duration) -> SearchResult<()>;

    /// Check backend connectivity
    async fn health_check(&self) -> SearchResult<()>;

    /// Short backend name for logs and health reports
    fn backend(&self) -> &'static str;
}

/// Internal cache statistics with atomic counters for thread safety
#[derive(Debug, Default)]
struct CacheStatsInternal {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    read_errors: AtomicU64,
    write_errors: AtomicU64,
}

/// Cache statistics for monitoring hit/miss ratios
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub read_errors: u64,
    pub write_errors: u64,
}

impl CacheStats {
    /// Hit ratio over all lookups, failed lookups count as misses
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cache manager sitting between the orchestrator and a `CacheStore`
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    stats: CacheStatsInternal,
}

impl CacheManager {
    /// Create a new cache manager over the given backend
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            stats: CacheStatsInternal::default(),
        }
    }

    /// Normalize a query for cache-key purposes: trim, collapse whitespace, case-fold
    pub fn normalize_query(query: &str) -> String {
        query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Deterministic key for a (query, limit) pair
    pub fn generate_query_key(query: &str, limit: u32) -> String {
        let normalized = Self::normalize_query(query);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        format!("{}:{}:{}", KEY_PREFIX, hex::encode(hasher.finalize()), limit)
    }

    /// Look up an entry; backend failures are logged and reported as a miss
    pub async fn lookup(&self, key: &str) -> Option<CachedSearch> {
        match self.store.get(key).await {
            Ok(Some(entry)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache hit for key: {} ({} results)",
                    LoggingService::sanitize_cache_key(key),
                    entry.results.len()
                );
                Some(entry)
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for key: {}", LoggingService::sanitize_cache_key(key));
                None
            }
            Err(e) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                self.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Cache lookup failed on {} backend, treating as miss: {}", self.store.backend(), e);
                None
            }
        }
    }

    /// Store an entry with the configured TTL; failures are logged and dropped
    pub async fn store(&self, key: &str, entry: &CachedSearch) -> bool {
        match self.store.set(key, entry, self.ttl).await {
            Ok(()) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cached {} results under key: {}",
                    entry.results.len(),
                    LoggingService::sanitize_cache_key(key)
                );
                true
            }
            Err(e) => {
                self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Cache write failed on {} backend: {}", self.store.backend(), e);
                false
            }
        }
    }

    /// Check backend health
    pub async fn health_check(&self) -> SearchResult<()> {
        self.store.health_check().await
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get cache hit/miss statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            writes: self.stats.writes.load(Ordering::Relaxed),
            read_errors: self.stats.read_errors.load(Ordering::Relaxed),
            write_errors: self.stats.write_errors.load(Ordering::Relaxed),
        }
    }
}
