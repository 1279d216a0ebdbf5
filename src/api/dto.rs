//! Data Transfer Objects
//!
//! Response types for the operational endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving
    pub status: String,
    /// Time the check was answered
    pub timestamp: DateTime<Utc>,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Live WebSocket connections
    pub connections: usize,
    /// Application version
    pub version: String,
}
