use tracing::subscriber::set_global_default;
use tracing_subscriber::{
    fmt::{self, format::JsonFields},
    layer::SubscriberExt,
    EnvFilter, Registry,
};
use crate::error::{SearchError, SearchResult};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,shopping_search_gateway=debug";

/// Build the env filter from `RUST_LOG`, falling back to `DEFAULT_FILTER`
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize global tracing subscriber with JSON formatting
pub fn init_tracing() -> SearchResult<()> {
    let formatting_layer = fmt::layer()
        .json()
        .with_current_span(false)
        .with_span_list(true)
        .fmt_fields(JsonFields::new());

    let subscriber = Registry::default()
        .with(env_filter())
        .with(formatting_layer);

    set_global_default(subscriber)
        .map_err(|e| SearchError::Internal(format!("Failed to set global subscriber: {}", e)))?;

    Ok(())
}
