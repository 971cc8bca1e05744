use thiserror::Error;

/// Main error type for the search gateway
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A single upstream attempt exceeded its deadline
    #[error("Upstream request timed out after {0} ms")]
    UpstreamTimeout(u64),

    /// Upstream responded with a failure, or the call failed before a response
    #[error("Upstream error: {message}")]
    UpstreamError {
        /// HTTP status when the provider answered
        status: Option<u16>,
        message: String,
        /// Whether another attempt could succeed
        transient: bool,
    },

    /// Upstream could not serve the request after the retry budget was spent
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Cache backend failure
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Boundary outcome for a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// The caller sent something we cannot serve
    ClientError,
    /// A dependency is down; retrying later may work
    ServiceUnavailable,
    /// Anything else
    Internal,
}

impl SearchError {
    /// Upstream failure that answered with an HTTP status
    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        SearchError::UpstreamError {
            status: Some(status),
            message: message.into(),
            transient: status >= 500,
        }
    }

    /// Upstream failure with no usable response (connection reset, DNS, ...)
    pub fn upstream_transport(message: impl Into<String>) -> Self {
        SearchError::UpstreamError {
            status: None,
            message: message.into(),
            transient: true,
        }
    }

    /// Upstream answered but the answer is unusable; retrying will not help
    pub fn upstream_rejected(message: impl Into<String>) -> Self {
        SearchError::UpstreamError {
            status: None,
            message: message.into(),
            transient: false,
        }
    }

    /// Whether a retry of the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::UpstreamTimeout(_) => true,
            SearchError::UpstreamError { transient, .. } => *transient,
            SearchError::CacheUnavailable(_) => true,
            SearchError::Internal(_) => true,

            SearchError::InvalidRequest(_) => false,
            SearchError::UpstreamUnavailable(_) => false,
            SearchError::ConfigError(_) => false,
            SearchError::SerializationError(_) => false,
        }
    }

    /// Map the error to one of the three boundary outcomes
    pub fn outcome_kind(&self) -> OutcomeKind {
        match self {
            SearchError::InvalidRequest(_) => OutcomeKind::ClientError,
            SearchError::UpstreamUnavailable(_) => OutcomeKind::ServiceUnavailable,
            _ => OutcomeKind::Internal,
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self.outcome_kind() {
            OutcomeKind::ClientError => 400,
            OutcomeKind::ServiceUnavailable => 503,
            OutcomeKind::Internal => 500,
        }
    }

    /// Get error type as string for logging and metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            SearchError::InvalidRequest(_) => "invalid_request",
            SearchError::UpstreamTimeout(_) => "upstream_timeout",
            SearchError::UpstreamError { .. } => "upstream_error",
            SearchError::UpstreamUnavailable(_) => "upstream_unavailable",
            SearchError::CacheUnavailable(_) => "cache_unavailable",
            SearchError::ConfigError(_) => "config_error",
            SearchError::SerializationError(_) => "serialization_error",
            SearchError::Internal(_) => "internal_error",
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for SearchError {
    fn from(err: std::io::Error) -> Self {
        SearchError::Internal(format!("IO error: {}", err))
    }
}

/// Result type alias for gateway operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Validation error for request parameters
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Query parameter \"q\" is required")]
    MissingQuery,

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}

impl From<ValidationError> for SearchError {
    fn from(err: ValidationError) -> Self {
        SearchError::InvalidRequest(err.to_string())
    }
}
