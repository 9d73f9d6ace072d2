//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by route, method, status
//! - `edge_request_duration_seconds` (histogram): time to response head, by route
//! - `edge_upstream_errors_total` (counter): failed upstream exchanges by kind
//! - `edge_active_connections` (gauge): current connection count
//!
//! Without an installed recorder every call is a no-op, so tests and
//! deployments without Prometheus pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::Method;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed dispatch.
pub fn record_request(route: &'static str, method: &Method, status: u16, started: Instant) {
    metrics::counter!(
        "edge_requests_total",
        "route" => route,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("edge_request_duration_seconds", "route" => route)
        .record(started.elapsed().as_secs_f64());
}

/// Record an upstream failure.
pub fn record_upstream_error(kind: &'static str) {
    metrics::counter!("edge_upstream_errors_total", "kind" => kind).increment(1);
}
