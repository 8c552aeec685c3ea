//! Metrics collection and exposition.
//!
//! # Metrics
//! - `msgsec_reloads_total` (counter): install attempts by outcome
//! - `msgsec_config_generation` (gauge): generation of the live snapshot
//! - `msgsec_resolutions_total` (counter): resolutions by layer and outcome
//! - `msgsec_activations_total` (counter): module activations by convention and outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - The Prometheus endpoint is opt-in through `observability.metrics_enabled`

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_reload(outcome: &'static str) {
    counter!("msgsec_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_generation(generation: u64) {
    gauge!("msgsec_config_generation").set(generation as f64);
}

pub fn record_resolution(layer: &str, outcome: &'static str) {
    counter!(
        "msgsec_resolutions_total",
        "layer" => layer.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_activation(convention: &'static str, outcome: &'static str) {
    counter!(
        "msgsec_activations_total",
        "convention" => convention,
        "outcome" => outcome
    )
    .increment(1);
}
