//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gatekeeper metrics (requests, latency, credential renewals)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `gatekeeper_requests_total` (counter): requests by mode, status
//! - `gatekeeper_request_duration_seconds` (histogram): latency by mode
//! - `gatekeeper_credential_renewals_total` (counter): logins and refreshes by outcome
//! - `gatekeeper_signed_requests_total` (counter): outbound requests given a bearer token
//! - `gatekeeper_cookie_chunks` (histogram): cookies needed per written value
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so tests and
//!   disabled deployments pay nothing
//! - Label values are a small closed set (mode, status code, outcome)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(mode: &'static str, status: u16, start: Instant) {
    ::metrics::counter!(
        "gatekeeper_requests_total",
        "mode" => mode,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gatekeeper_request_duration_seconds", "mode" => mode)
        .record(start.elapsed().as_secs_f64());
}

/// `kind` is "login" or "refresh".
pub fn record_credential_renewal(kind: &'static str, outcome: &'static str) {
    ::metrics::counter!(
        "gatekeeper_credential_renewals_total",
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_signed_request() {
    ::metrics::counter!("gatekeeper_signed_requests_total").increment(1);
}

pub fn record_cookie_chunks(chunks: usize) {
    ::metrics::histogram!("gatekeeper_cookie_chunks").record(chunks as f64);
}
