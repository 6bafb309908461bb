//! Metrics collection and exposition.
//!
//! # Metrics
//! - `asn_filter_decisions_total` (counter): request verdicts by decision
//! - `asn_filter_lookup_failures_total` (counter): unclassifiable IPs by reason
//! - `asn_filter_reloads_total` (counter): filter rebuilds by outcome
//! - `asn_filter_database_refresh_total` (counter): database downloads by outcome
//! - `asn_filter_upstream_requests_total` (counter): forwarded requests by status
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_decision(decision: &'static str) {
    counter!("asn_filter_decisions_total", "decision" => decision).increment(1);
}

pub fn record_lookup_failure(reason: &'static str) {
    counter!("asn_filter_lookup_failures_total", "reason" => reason).increment(1);
}

pub fn record_reload(outcome: &'static str) {
    counter!("asn_filter_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_refresh(outcome: &'static str) {
    counter!("asn_filter_database_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream(status: u16) {
    counter!("asn_filter_upstream_requests_total", "status" => status.to_string()).increment(1);
}
