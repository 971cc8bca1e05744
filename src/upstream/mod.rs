/// Upstream shopping-search provider
///
/// The provider answers with JSON whose item shape varies per retailer, so the
/// payload keeps each item as an untyped `serde_json::Value` and leaves field
/// extraction to the normalizer.

pub mod serpapi;


pub use serpapi::SerpApiClient;

use crate::error::{SearchError, SearchResult};
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

/// Provider message meaning "zero results", not a failure
const NO_RESULTS_MARKER: &str = "hasn't returned any results";

/// Raw provider payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawShoppingPayload {
    /// Items in provider order
    pub items: Vec<Value>,
    /// Provider-side search id, when present
    pub search_id: Option<String>,
}

impl RawShoppingPayload {
    pub fn new(items: Vec<Value>) -> Self {
        Self { items, search_id: None }
    }

    /// Interpret a decoded response body
    ///
    /// A provider-reported `error` fails the call, except for the provider's
    /// "no results" message which yields an empty payload.
    pub fn from_value(body: Value) -> SearchResult<Self> {
        let Value::Object(mut body) = body else {
            return Err(SearchError::upstream_rejected("Provider payload is not a JSON object"));
        };

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            if message.contains(NO_RESULTS_MARKER) {
                return Ok(Self::default());
            }
            return Err(SearchError::upstream_rejected(format!("Provider error: {}", message)));
        }

        let search_id = body
            .get("search_metadata")
            .and_then(|meta| meta.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let items = match body.remove("shopping_results") {
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(Value::Array(_)) | Some(Value::Null) | None => match body.remove("inline_shopping_results") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            Some(other) => {
                warn!("Ignoring non-array shopping_results of type {}", json_type(&other));
                Vec::new()
            }
        };

        Ok(Self { items, search_id })
    }
}

/// Name of a JSON value's type, for log lines
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Source of raw shopping results
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// Run one search, including any retries the provider client applies
    async fn fetch(&self, query: &str, limit: u32) -> SearchResult<RawShoppingPayload>;

    /// Short provider name for logs and health reports
    fn name(&self) -> &'static str;
}
