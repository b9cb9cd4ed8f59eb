//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by mode and status
//! - `relay_request_duration_seconds` (histogram): time to response headers
//! - `relay_session_updates_total` (counter): Set-Cookie merges
//! - `relay_error_pages_total` (counter): disguised HTML error pages caught
//! - `relay_upstream_errors_total` (counter): transport failures
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished relay request.
pub fn record_request(mode: &'static str, status: u16, start: Instant) {
    counter!("relay_requests_total", "mode" => mode, "status" => status.to_string()).increment(1);
    histogram!("relay_request_duration_seconds", "mode" => mode).record(start.elapsed().as_secs_f64());
}

pub fn record_session_update() {
    counter!("relay_session_updates_total").increment(1);
}

pub fn record_error_page() {
    counter!("relay_error_pages_total").increment(1);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("relay_upstream_errors_total", "kind" => kind).increment(1);
}
