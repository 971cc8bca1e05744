pub mod metrics;
pub mod tracing;
pub mod logging;
pub mod health;

#[cfg(test)]
mod tests;

pub use metrics::{Metrics, MetricsRegistry, Timer};
pub use tracing::init_tracing;
pub use logging::LoggingService;
pub use health::{ComponentHealth, HealthReport, HealthService, HealthStatus, Liveness};
