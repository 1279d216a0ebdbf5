//! Prometheus metrics recorder and metric names.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Accepted connections total (counter).
pub const RELAY_CONNECTIONS_TOTAL: &str = "relay_connections_total";
/// Currently registered connections (gauge).
pub const RELAY_CONNECTIONS_ACTIVE: &str = "relay_connections_active";
/// Recognized inbound messages total (counter, labels: kind).
pub const RELAY_MESSAGES_TOTAL: &str = "relay_messages_total";
/// Frames dropped because they could not be decoded (counter).
pub const RELAY_MALFORMED_FRAMES_TOTAL: &str = "relay_malformed_frames_total";
/// Per-recipient write failures during fan-out (counter).
pub const RELAY_DELIVERY_FAILURES_TOTAL: &str = "relay_delivery_failures_total";

/// Install the Prometheus recorder globally.
///
/// Must be called once at startup, before any metric is recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    describe();
    tracing::info!("Prometheus metrics recorder installed");
    handle
}

/// Build a handle without installing it globally (tests, embedding)
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

fn describe() {
    describe_counter!(RELAY_CONNECTIONS_TOTAL, "Accepted WebSocket connections");
    describe_gauge!(RELAY_CONNECTIONS_ACTIVE, "Currently registered connections");
    describe_counter!(RELAY_MESSAGES_TOTAL, "Recognized inbound messages by kind");
    describe_counter!(RELAY_MALFORMED_FRAMES_TOTAL, "Dropped undecodable frames");
    describe_counter!(RELAY_DELIVERY_FAILURES_TOTAL, "Failed per-recipient writes");
}
