use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SearchResult, ValidationError};

/// Version string echoed in every search envelope
pub const API_VERSION: &str = "1.0.0";

/// Human-readable service name echoed in envelopes and health reports
pub const SERVICE_NAME: &str = "Smart Shopping Assistant";

/// Canonical product record returned to callers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product title, empty when the provider omitted it
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// Retailer or seller name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_icon: Option<String>,
    #[serde(default)]
    pub multiple_sources: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Display price exactly as the provider sent it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Numeric price; absent means unknown, never zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_old_price: Option<f64>,
    /// Rating in [1, 5]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,
    /// Provider rank for this item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl ProductRecord {
    /// A record is servable when it carries a title or a product id
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() || self.product_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Validated search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Trimmed query text as the caller typed it
    pub query: String,
    /// Number of results wanted, within [1, max_limit]
    pub limit: u32,
}

impl SearchRequest {
    /// Validate raw parameters; a missing limit falls back to `default_limit`
    pub fn validated(
        query: &str,
        limit: Option<u32>,
        default_limit: u32,
        max_limit: u32,
    ) -> SearchResult<Self> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::MissingQuery.into());
        }

        let limit = limit.unwrap_or(default_limit);
        if limit < 1 || limit > max_limit {
            return Err(ValidationError::InvalidLimit(format!(
                "limit must be between 1 and {}, got {}",
                max_limit, limit
            ))
            .into());
        }

        Ok(Self {
            query: query.to_string(),
            limit,
        })
    }
}

/// Result of one orchestrated search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub records: Vec<ProductRecord>,
    pub cached: bool,
    pub latency_ms: u64,
}

/// Response envelope handed to the routing layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ProductRecord>,
    pub count: usize,
    pub cached: bool,
    pub response_time_ms: u64,
    pub api_version: String,
    pub service: String,
    pub limit: u32,
}

impl SearchResponse {
    /// Build the envelope; `count` always mirrors `results`
    pub fn from_outcome(request: &SearchRequest, outcome: SearchOutcome) -> Self {
        Self {
            query: request.query.clone(),
            count: outcome.records.len(),
            results: outcome.records,
            cached: outcome.cached,
            response_time_ms: outcome.latency_ms,
            api_version: API_VERSION.to_string(),
            service: SERVICE_NAME.to_string(),
            limit: request.limit,
        }
    }
}

/// Value stored in the cache for one (query, limit) key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSearch {
    /// Query text that populated the entry
    pub query: String,
    pub results: Vec<ProductRecord>,
    pub cached_at: DateTime<Utc>,
    /// Upstream latency that produced the entry
    pub response_time_ms: u64,
}

/// How a search request ended, for usage analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestOutcome {
    Success,
    Timeout,
    Failed,
}

/// One usage event per search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub query: String,
    pub cache_hit: bool,
    pub result_count: usize,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub outcome: RequestOutcome,
}

impl AnalyticsEvent {
    pub fn success(query: &str, cache_hit: bool, result_count: usize, latency_ms: u64) -> Self {
        Self {
            query: query.to_string(),
            cache_hit,
            result_count,
            latency_ms,
            timestamp: Utc::now(),
            outcome: RequestOutcome::Success,
        }
    }

    pub fn failure(query: &str, outcome: RequestOutcome, latency_ms: u64) -> Self {
        Self {
            query: query.to_string(),
            cache_hit: false,
            result_count: 0,
            latency_ms,
            timestamp: Utc::now(),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_limit_boundaries() {
        assert!(SearchRequest::validated("tv", Some(0), 20, 100).is_err());
        assert!(SearchRequest::validated("tv", Some(101), 20, 100).is_err());
        assert_eq!(SearchRequest::validated("tv", Some(1), 20, 100).unwrap().limit, 1);
        assert_eq!(SearchRequest::validated("tv", Some(100), 20, 100).unwrap().limit, 100);
        assert_eq!(SearchRequest::validated("tv", None, 20, 100).unwrap().limit, 20);
    }

    #[test]
    fn test_request_rejects_blank_query() {
        assert!(SearchRequest::validated("", Some(5), 20, 100).is_err());
        assert!(SearchRequest::validated("   \t", Some(5), 20, 100).is_err());

        let request = SearchRequest::validated("  peanut butter ", None, 20, 100).unwrap();
        assert_eq!(request.query, "peanut butter");
    }

    #[test]
    fn test_product_validity() {
        let mut record = ProductRecord::default();
        assert!(!record.is_valid());

        record.product_id = Some("123".to_string());
        assert!(record.is_valid());

        record.product_id = None;
        record.title = "Headphones".to_string();
        assert!(record.is_valid());
    }

    #[test]
    fn test_product_serialization_omits_unknown_fields() {
        let record = ProductRecord {
            title: "Widget".to_string(),
            price: Some("Price not available".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["title"], "Widget");
        assert_eq!(json["price"], "Price not available");
        assert!(json.get("extracted_price").is_none());
        assert_eq!(json["badges"], serde_json::json!([]));
    }

    #[test]
    fn test_response_count_matches_results() {
        let request = SearchRequest::validated("widget", Some(2), 20, 100).unwrap();
        let outcome = SearchOutcome {
            records: vec![
                ProductRecord { title: "a".into(), ..Default::default() },
                ProductRecord { title: "b".into(), ..Default::default() },
            ],
            cached: true,
            latency_ms: 3,
        };
        let response = SearchResponse::from_outcome(&request, outcome);
        assert_eq!(response.count, 2);
        assert_eq!(response.api_version, API_VERSION);
        assert!(response.cached);
    }
}
