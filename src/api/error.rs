//! API Error Types
//!
//! Failures that can stop the HTTP server from starting or running.

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
