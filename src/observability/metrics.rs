//! Prometheus metrics for the bridge.
//!
//! Provides metrics for:
//! - Inbound decision requests (`http_*`)
//! - Outbound calls to the identity provider and AMS (`client_*`)
//! - Access review cache lookups

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;
use std::time::Duration;

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Outbound client label for identity provider calls.
pub const CLIENT_OAUTH: &str = "oauth";
/// Outbound client label for access review calls.
pub const CLIENT_AMS: &str = "ams";

/// Global Prometheus handle for the metrics endpoint.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &seconds_from_ms(&config.latency_buckets_ms),
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    let handle = builder.install_recorder().map_err(MetricsError::Install)?;

    // Store handle for the metrics endpoint
    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        tracing::warn!("Metrics are enabled in config but the 'prometheus' feature is not compiled");
    }
    Ok(())
}

/// Convert millisecond buckets to seconds.
#[cfg(feature = "prometheus")]
fn seconds_from_ms(ms_buckets: &[f64]) -> Vec<f64> {
    ms_buckets.iter().map(|ms| ms / 1000.0).collect()
}

/// Render the current metrics in Prometheus text format, if metrics are
/// installed.
pub fn render() -> Option<String> {
    #[cfg(feature = "prometheus")]
    {
        PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
    }
    #[cfg(not(feature = "prometheus"))]
    {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record an inbound HTTP request.
pub fn record_http_request(handler: &str, method: &str, status: u16, duration: Duration) {
    #[cfg(feature = "prometheus")]
    {
        let code = status.to_string();

        counter!(
            "http_requests_total",
            "code" => code.clone(),
            "method" => method.to_string(),
            "handler" => handler.to_string()
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "code" => code,
            "method" => method.to_string(),
            "handler" => handler.to_string()
        )
        .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (handler, method, status, duration);
    }
}

/// Record an outbound request made by one of the instrumented clients.
///
/// `status` is `None` when no response was received.
pub fn record_client_request(
    client: &'static str,
    method: &str,
    status: Option<u16>,
    duration: Duration,
) {
    #[cfg(feature = "prometheus")]
    {
        // "0" rather than an empty label for requests that never got a response
        let code = status.map_or("0".to_string(), |c| c.to_string());

        counter!(
            "client_api_requests_total",
            "code" => code,
            "method" => method.to_string(),
            "client" => client
        )
        .increment(1);

        histogram!(
            "client_request_duration_seconds",
            "method" => method.to_string(),
            "client" => client
        )
        .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (client, method, status, duration);
    }
}

/// Record an access review cache lookup (`hit`, `miss` or `error`).
pub fn record_cache_lookup(result: &'static str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("cache_requests_total", "result" => result).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = result;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
