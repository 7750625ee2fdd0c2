//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (bridges, frames, proxy requests)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_ws_connections_active` (gauge): live chat bridges
//! - `gateway_ws_connections_total` (counter): bridges ever started
//! - `gateway_chat_frames_total` (counter): relayed frames by direction
//! - `gateway_chat_malformed_total` (counter): skipped client frames
//! - `gateway_chat_session_failures_total` (counter): failures by stage
//! - `gateway_proxy_requests_total` (counter): proxied requests by route, status
//! - `gateway_proxy_request_duration_seconds` (histogram): proxy latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The exporter is only installed when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const WS_CONNECTIONS_ACTIVE: &str = "gateway_ws_connections_active";
pub const WS_CONNECTIONS_TOTAL: &str = "gateway_ws_connections_total";
pub const CHAT_FRAMES_TOTAL: &str = "gateway_chat_frames_total";
pub const CHAT_MALFORMED_TOTAL: &str = "gateway_chat_malformed_total";
pub const CHAT_SESSION_FAILURES_TOTAL: &str = "gateway_chat_session_failures_total";
pub const PROXY_REQUESTS_TOTAL: &str = "gateway_proxy_requests_total";
pub const PROXY_REQUEST_DURATION_SECONDS: &str = "gateway_proxy_request_duration_seconds";

/// Direction of a relayed chat frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to backend.
    Inbound,
    /// Backend to client.
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Stage of the bridge at which a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Connect,
    Join,
    Relay,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Join => "join",
            Self::Relay => "relay",
        }
    }
}

/// Install the Prometheus recorder and start its HTTP listener.
///
/// Must be called from inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

pub fn ws_connection_opened() {
    metrics::counter!(WS_CONNECTIONS_TOTAL).increment(1);
    metrics::gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
}

pub fn ws_connection_closed() {
    metrics::gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
}

pub fn record_frame(direction: Direction) {
    metrics::counter!(CHAT_FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
}

pub fn record_malformed_frame() {
    metrics::counter!(CHAT_MALFORMED_TOTAL).increment(1);
}

pub fn record_session_failure(stage: FailureStage) {
    metrics::counter!(CHAT_SESSION_FAILURES_TOTAL, "stage" => stage.as_str()).increment(1);
}

/// Record one proxied request and its latency.
pub fn record_proxy_request(route: &str, status: u16, start: Instant) {
    let route = route.to_string();
    metrics::counter!(
        PROXY_REQUESTS_TOTAL,
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(PROXY_REQUEST_DURATION_SECONDS, "route" => route)
        .record(start.elapsed().as_secs_f64());
}
