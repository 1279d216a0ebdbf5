//! Application State
//!
//! Shared state accessible by all HTTP and WebSocket handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::relay::{RegistryConfig, Relay};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Chat relay owning the connection registry
    pub relay: Arc<Relay>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// Handle for rendering the Prometheus exposition
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Create a new AppState with a fresh relay
    pub fn new(config: ServerConfig, relay_config: RegistryConfig, metrics: PrometheusHandle) -> Self {
        Self::with_relay(Arc::new(Relay::new(relay_config)), config, metrics)
    }

    /// Create AppState around an existing relay
    pub fn with_relay(relay: Arc<Relay>, config: ServerConfig, metrics: PrometheusHandle) -> Self {
        Self {
            relay,
            config: Arc::new(config),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get live connection count
    pub async fn connection_count(&self) -> usize {
        self.relay.connection_count().await
    }
}
