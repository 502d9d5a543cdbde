//! Health check endpoints for Kubernetes probes and monitoring.

use std::time::Instant;

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::{AppState, observability::metrics::render};

/// Detailed health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "degraded"
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Number of tenants with organization mappings
    pub tenants: usize,
    /// Cache status, absent when no cache is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<ComponentStatus>,
}

/// Status of a single component.
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    /// Backend name ("memory" or "redis")
    pub backend: &'static str,
    /// Whether the component is healthy
    pub healthy: bool,
    /// Optional message with details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Latency of the health check in milliseconds
    pub latency_ms: u64,
}

/// Full health check.
///
/// An unreachable cache degrades the bridge but does not stop it from
/// answering decisions, so this always returns 200.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let cache = match &state.cache {
        Some(cache) => {
            let start = Instant::now();
            let result = cache.ping().await;
            Some(ComponentStatus {
                backend: cache.backend(),
                healthy: result.is_ok(),
                message: result.err().map(|e| e.to_string()),
                latency_ms: start.elapsed().as_millis() as u64,
            })
        }
        None => None,
    };

    let degraded = cache.as_ref().is_some_and(|c| !c.healthy);

    Json(HealthStatus {
        status: if degraded { "degraded" } else { "healthy" },
        version: env!("CARGO_PKG_VERSION"),
        tenants: state.tenants.len(),
        cache,
    })
}

/// Kubernetes liveness probe.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Prometheus metrics endpoint.
///
/// Returns metrics in Prometheus text format.
#[tracing::instrument(name = "health.metrics")]
pub async fn metrics() -> impl IntoResponse {
    match render() {
        Some(rendered) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            rendered,
        ),
        None => (
            StatusCode::NOT_FOUND,
            [("content-type", "text/plain")],
            "Metrics not enabled".to_string(),
        ),
    }
}
