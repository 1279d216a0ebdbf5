//! Metrics Route
//!
//! - GET /metrics - Prometheus text exposition

use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::Arc;

use crate::api::state::AppState;
use crate::metrics::RELAY_CONNECTIONS_ACTIVE;

/// GET /metrics
pub async fn prometheus(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // gauge mirrors the registry at scrape time
    let connections = state.connection_count().await;
    metrics::gauge!(RELAY_CONNECTIONS_ACTIVE).set(connections as f64);

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
