/// Search pipeline
///
/// This module contains:
/// - The orchestrator deciding between cache and upstream
/// - Normalization of raw provider items into product records
/// - Retry with exponential backoff for upstream calls

pub mod normalizer;
pub mod retry;
pub mod service;


pub use normalizer::Normalizer;
pub use retry::{RetryConfig, RetryExecutor, RetryStrategy};
pub use service::SearchService;
