use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use crate::analytics::AnalyticsDispatcher;
use crate::cache::CacheManager;
use crate::types::{API_VERSION, SERVICE_NAME};
use crate::upstream::UpstreamProvider;

/// Upper bound on a single dependency probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Health status of a component or of the whole service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health status of individual components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
}

impl ComponentHealth {
    fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: Some(message.into()),
            response_time_ms: None,
        }
    }

    fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            response_time_ms: None,
        }
    }
}

/// Component report served at `/api/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub uptime_seconds: u64,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Liveness answer served at `/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Liveness {
    pub status: String,
    pub message: String,
}

/// Health checks over the gateway's dependencies
#[derive(Debug, Clone)]
pub struct HealthService {
    started_at: Instant,
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthService {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn liveness(&self) -> Liveness {
        Liveness {
            status: "healthy".to_string(),
            message: "Service is up and running".to_string(),
        }
    }

    /// Probe every component; any unhealthy one degrades the service
    pub async fn check(
        &self,
        cache: &CacheManager,
        upstream: &dyn UpstreamProvider,
        analytics: &AnalyticsDispatcher,
    ) -> HealthReport {
        let mut components = BTreeMap::new();

        components.insert("cache".to_string(), Self::check_cache(cache).await);
        components.insert(
            "upstream".to_string(),
            ComponentHealth::healthy(format!("{} client configured", upstream.name())),
        );
        components.insert(
            "analytics".to_string(),
            if analytics.is_open() {
                ComponentHealth::healthy("queue open")
            } else {
                ComponentHealth::unhealthy("queue closed")
            },
        );

        let status = if components.values().all(|c| c.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            service: SERVICE_NAME.to_string(),
            version: API_VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            components,
        }
    }

    async fn check_cache(cache: &CacheManager) -> ComponentHealth {
        let start = Instant::now();
        let mut health = match timeout(PROBE_TIMEOUT, cache.health_check()).await {
            Ok(Ok(())) => ComponentHealth::healthy(format!("{} backend reachable", cache.backend())),
            Ok(Err(e)) => ComponentHealth::unhealthy(e.to_string()),
            Err(_) => ComponentHealth::unhealthy(format!("{} backend probe timed out", cache.backend())),
        };
        health.response_time_ms = Some(start.elapsed().as_secs_f64() * 1000.0);
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_shape() {
        let liveness = HealthService::new().liveness();
        let json = serde_json::to_value(&liveness).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["message"].is_string());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_value(HealthStatus::Degraded).unwrap(), "degraded");
    }
}
