//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): inbound requests by api type, status
//! - `router_request_duration_seconds` (histogram): end-to-end latency
//! - `router_backend_attempts_total` (counter): attempts by model, backend, outcome
//! - `router_backend_healthy` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished inbound request.
pub fn record_request(api_type: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "router_requests_total",
        "api_type" => api_type,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("router_request_duration_seconds", "api_type" => api_type)
        .record(start.elapsed().as_secs_f64());
}

/// Record the outcome of one backend attempt.
pub fn record_attempt(model: &str, backend: &str, outcome: &'static str) {
    metrics::counter!(
        "router_backend_attempts_total",
        "model" => model.to_string(),
        "backend" => backend.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Publish a backend's current health.
pub fn record_backend_health(model: &str, backend: &str, healthy: bool) {
    metrics::gauge!(
        "router_backend_healthy",
        "model" => model.to_string(),
        "backend" => backend.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}
