//! # Chatrelay
//!
//! Real-time chat broadcast relay: clients hold a WebSocket open, optionally
//! announce a display name, and every chat line they send is fanned out to
//! all connected clients, interleaved with join/leave/welcome notices.
//!
//! ## Modules
//!
//! - [`relay`]: Connection registry, protocol state machine, fan-out
//! - [`api`]: Router, health and metrics endpoints with Axum
//! - [`config`]: TOML + environment configuration
//! - [`metrics`]: Prometheus recorder and metric names
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatrelay::relay::{FrameOutcome, Relay};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = Relay::default();
//!
//!     // Each connection gets an outbound queue
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let (id, user_id) = relay.connect(tx).await?;
//!
//!     let outcome = relay
//!         .handle_frame(id, br#"{"type":"message","text":"hi"}"#)
//!         .await;
//!     assert_eq!(outcome, FrameOutcome::Broadcast { recipients: 1 });
//!
//!     let line = rx.recv().await.unwrap();
//!     println!("{} said: {}", user_id, serde_json::to_string(&line)?);
//!
//!     relay.disconnect(id).await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod metrics;
pub mod relay;

// Re-export top-level types for convenience
pub use relay::{
    websocket_handler, ClientMessage, Connection, ConnectionId, ConnectionRegistry, FrameOutcome,
    Inbound, RegistryConfig, RegistryError, Relay, ServerMessage,
};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig, RelayConfig, ServerConfig};
