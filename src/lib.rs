pub mod analytics;
pub mod cache;
pub mod config;
pub mod error;
pub mod observability;
pub mod search;
pub mod server;
pub mod types;
pub mod upstream;

pub use error::{SearchError, SearchResult};
pub use types::*;
pub use server::SearchServer;
pub use config::Config;
pub use cache::{CacheManager, CacheStore};
pub use analytics::{AnalyticsDispatcher, AnalyticsRecorder, UsageStatsRecorder};
pub use upstream::{SerpApiClient, UpstreamProvider};
pub use search::{Normalizer, RetryConfig, RetryExecutor, RetryStrategy, SearchService};
