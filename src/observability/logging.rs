use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::env;
use std::sync::OnceLock;
use tracing::{event, Level};
use uuid::Uuid;
use crate::error::SearchError;
use crate::types::SERVICE_NAME;

/// Longest query text written to logs
const MAX_LOGGED_QUERY_CHARS: usize = 200;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern is valid")
    })
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{3}[-. ]?\d{3}[-. ]?\d{4}\b").expect("phone pattern is valid"))
}

/// Structured JSON logging service with trace_id injection
#[derive(Clone)]
pub struct LoggingService {
    service_name: String,
    service_version: String,
    environment: String,
}

impl Default for LoggingService {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingService {
    /// Create a new logging service
    pub fn new() -> Self {
        let service_version = env::var("SERVICE_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string());

        Self {
            service_name: SERVICE_NAME.to_string(),
            service_version,
            environment,
        }
    }

    /// Log a structured message tagged with `trace_id`
    pub fn log_structured(
        &self,
        level: Level,
        message: &str,
        trace_id: Uuid,
        fields: Option<HashMap<String, Value>>,
    ) {
        let mut log_entry = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": level.to_string().to_uppercase(),
            "message": message,
            "trace_id": trace_id.to_string(),
            "service": {
                "name": self.service_name,
                "version": self.service_version,
                "environment": self.environment
            }
        });

        if let (Some(fields), Value::Object(map)) = (fields, &mut log_entry) {
            map.extend(fields);
        }

        match level {
            Level::ERROR => event!(Level::ERROR, %trace_id, "{}", log_entry),
            Level::WARN => event!(Level::WARN, %trace_id, "{}", log_entry),
            Level::INFO => event!(Level::INFO, %trace_id, "{}", log_entry),
            Level::DEBUG => event!(Level::DEBUG, %trace_id, "{}", log_entry),
            Level::TRACE => event!(Level::TRACE, %trace_id, "{}", log_entry),
        }
    }

    /// Log an incoming search with its query sanitized
    pub fn log_search_request(&self, trace_id: Uuid, query: &str, limit: Option<u32>) {
        let fields = HashMap::from([
            ("query_length".to_string(), json!(query.chars().count())),
            ("sanitized_query".to_string(), json!(Self::sanitize_query(query))),
            ("limit".to_string(), json!(limit)),
        ]);

        self.log_structured(Level::INFO, "Search request received", trace_id, Some(fields));
    }

    /// Log a completed search
    pub fn log_search_response(&self, trace_id: Uuid, duration_ms: u64, result_count: usize, cached: bool) {
        let fields = HashMap::from([
            ("duration_ms".to_string(), json!(duration_ms)),
            ("result_count".to_string(), json!(result_count)),
            ("cached".to_string(), json!(cached)),
        ]);

        self.log_structured(Level::INFO, "Search request completed", trace_id, Some(fields));
    }

    /// Log a failed search; client mistakes are logged at `warn`
    pub fn log_error(&self, trace_id: Uuid, error: &SearchError, context: Option<HashMap<String, Value>>) {
        let mut fields = HashMap::from([
            ("error_type".to_string(), json!(error.error_type())),
            ("error_message".to_string(), json!(error.to_string())),
            ("status_code".to_string(), json!(error.status_code())),
        ]);

        if let Some(context) = context {
            fields.extend(context);
        }

        let level = if error.status_code() < 500 { Level::WARN } else { Level::ERROR };
        self.log_structured(level, "Search request failed", trace_id, Some(fields));
    }

    /// Sanitize query for logging (remove PII, truncate)
    pub fn sanitize_query(query: &str) -> String {
        let sanitized = email_pattern().replace_all(query, "[EMAIL]");
        let sanitized = phone_pattern().replace_all(&sanitized, "[PHONE]");

        if sanitized.chars().count() > MAX_LOGGED_QUERY_CHARS {
            let mut truncated: String = sanitized.chars().take(MAX_LOGGED_QUERY_CHARS - 3).collect();
            truncated.push_str("...");
            truncated
        } else {
            sanitized.into_owned()
        }
    }

    /// Shorten a cache key for logging
    pub fn sanitize_cache_key(key: &str) -> String {
        let chars: Vec<char> = key.chars().collect();
        if chars.len() > 50 {
            let head: String = chars[..30].iter().collect();
            let tail: String = chars[chars.len() - 10..].iter().collect();
            format!("{}...{}", head, tail)
        } else {
            key.to_string()
        }
    }
}
