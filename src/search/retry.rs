/// Retry logic with exponential backoff for upstream calls
///
/// Only errors that report themselves as retryable are attempted again;
/// everything else surfaces on the first failure.

use crate::error::{SearchError, SearchResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Jitter factor (0.0 to 1.0) to add randomness
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200), // 200ms, 400ms
            max_delay: Duration::from_millis(2000),
            jitter_factor: 0.1, // 10% jitter
        }
    }
}

/// Retry strategy
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// Exponential backoff with jitter
    ExponentialBackoff(RetryConfig),
    /// No retries
    None,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::ExponentialBackoff(RetryConfig::default())
    }
}

/// Retry executor that handles different retry strategies
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    strategy: RetryStrategy,
}

impl RetryExecutor {
    /// Create a new retry executor with the given strategy
    pub fn new(strategy: RetryStrategy) -> Self {
        Self { strategy }
    }

    /// Create a retry executor with custom exponential backoff config
    pub fn with_config(config: RetryConfig) -> Self {
        if config.max_retries == 0 {
            return Self::new(RetryStrategy::None);
        }
        Self::new(RetryStrategy::ExponentialBackoff(config))
    }

    /// Total attempts this executor will make at most
    pub fn max_attempts(&self) -> u32 {
        match &self.strategy {
            RetryStrategy::ExponentialBackoff(config) => config.max_retries + 1,
            RetryStrategy::None => 1,
        }
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T>(&self, operation: F) -> SearchResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SearchResult<T>>,
    {
        match &self.strategy {
            RetryStrategy::ExponentialBackoff(config) => {
                self.execute_with_exponential_backoff(operation, config).await
            }
            RetryStrategy::None => operation().await,
        }
    }

    /// Execute operation with exponential backoff
    async fn execute_with_exponential_backoff<F, Fut, T>(
        &self,
        operation: F,
        config: &RetryConfig,
    ) -> SearchResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SearchResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        debug!("Not retrying error: {}", error);
                        return Err(error);
                    }

                    // Don't sleep after the last attempt
                    if attempt < config.max_retries {
                        let delay = self.calculate_exponential_delay(attempt, config);
                        warn!(
                            "Operation failed (attempt {}/{}), retrying in {:?}: {}",
                            attempt + 1,
                            config.max_retries + 1,
                            delay,
                            error
                        );
                        sleep(delay).await;
                    } else {
                        warn!(
                            "Operation failed after {} attempts: {}",
                            config.max_retries + 1,
                            error
                        );
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SearchError::Internal("Retry logic error: no attempts made".to_string())
        }))
    }

    /// Calculate exponential backoff delay with jitter
    fn calculate_exponential_delay(&self, attempt: u32, config: &RetryConfig) -> Duration {
        // base_delay * 2^attempt, shift bounded to avoid overflow
        let factor = 1u64 << attempt.min(16);
        let exponential_delay = Duration::from_millis(config.base_delay.as_millis() as u64 * factor);

        let capped_delay = std::cmp::min(exponential_delay, config.max_delay);

        if config.jitter_factor > 0.0 {
            let jitter_range = (capped_delay.as_millis() as f64 * config.jitter_factor) as u64;
            let jitter = rand::thread_rng().gen_range(0..=jitter_range);
            Duration::from_millis(capped_delay.as_millis() as u64 + jitter)
        } else {
            capped_delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1), // Fast for testing
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let executor = RetryExecutor::with_config(fast_config(2));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = executor
            .execute(|| async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Ok::<i32, SearchError>(42)
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let executor = RetryExecutor::with_config(fast_config(2));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = executor
            .execute(|| async {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(SearchError::upstream_status(503, "Temporary failure"))
                } else {
                    Ok::<i32, SearchError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_returns_last_error() {
        let executor = RetryExecutor::with_config(fast_config(2));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = executor
            .execute(|| async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<i32, SearchError>(SearchError::UpstreamTimeout(10))
            })
            .await;

        assert!(matches!(result, Err(SearchError::UpstreamTimeout(10))));
        assert_eq!(counter.load(Ordering::SeqCst), 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn test_no_retry_on_client_errors() {
        let executor = RetryExecutor::with_config(fast_config(2));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = executor
            .execute(|| async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<i32, SearchError>(SearchError::upstream_status(401, "Invalid API key"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1); // No retries
    }

    #[tokio::test]
    async fn test_exponential_backoff_calculation() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter_factor: 0.0, // No jitter for predictable testing
            ..Default::default()
        };
        let executor = RetryExecutor::with_config(config.clone());

        assert_eq!(executor.calculate_exponential_delay(0, &config), Duration::from_millis(100));
        assert_eq!(executor.calculate_exponential_delay(1, &config), Duration::from_millis(200));
        assert_eq!(executor.calculate_exponential_delay(2, &config), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_max_delay_cap() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            jitter_factor: 0.0,
            ..Default::default()
        };
        let executor = RetryExecutor::with_config(config.clone());

        assert_eq!(executor.calculate_exponential_delay(3, &config), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let executor = RetryExecutor::with_config(fast_config(0));
        assert_eq!(executor.max_attempts(), 1);

        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = executor
            .execute(|| async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<i32, SearchError>(SearchError::upstream_transport("reset"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
