//! Metrics collection and exposition.
//!
//! # Metrics
//! - `payments_submitted_total` (counter)
//! - `payments_completed_total` (counter): terminal outcomes by `state`
//! - `payment_status_polls_total` (counter): poll results by `result`
//! - `payment_status_retries_total` (counter)
//! - `gateway_requests_total` (counter): by `route`, `status`
//! - `gateway_request_duration_seconds` (histogram)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_payment_submitted() {
    metrics::counter!("payments_submitted_total").increment(1);
}

/// Record a terminal outcome (`success`, `failed`, `escalated`, ...).
pub fn record_payment_outcome(state: &'static str) {
    metrics::counter!("payments_completed_total", "state" => state).increment(1);
}

pub fn record_status_poll(result: &'static str) {
    metrics::counter!("payment_status_polls_total", "result" => result).increment(1);
}

pub fn record_status_retry() {
    metrics::counter!("payment_status_retries_total").increment(1);
}

pub fn record_gateway_request(route: &'static str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!("gateway_requests_total", "route" => route, "status" => status).increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}
