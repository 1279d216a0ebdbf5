//! Chat Relay
//!
//! Real-time broadcast of chat lines between WebSocket clients.
//!
//! ## Architecture
//!
//! - **Registry**: Tracks live connections and their session state
//! - **Protocol**: Classifies frames and decides who gets what
//! - **Broadcast**: Fan-out over a registry snapshot
//! - **Handler**: Handles WebSocket upgrade and the per-connection loop
//! - **Messages**: Defines client and server message formats
//!
//! ## Usage
//!
//! Clients connect to `/ws`, optionally identify, then chat:
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8000/ws');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'identify', username: 'Alice'}));
//!   ws.send(JSON.stringify({type: 'message', text: 'hi'}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log(msg.system ? msg.message : `${msg.username}: ${msg.message}`);
//! };
//! ```

mod broadcast;
mod handler;
mod messages;
mod protocol;
mod registry;

pub use broadcast::{deliver, fan_out, Audience};
pub use handler::websocket_handler;
pub use messages::{ClientMessage, DecodeError, Inbound, ServerMessage};
pub use protocol::{FrameOutcome, Relay};
pub use registry::{
    Connection, ConnectionId, ConnectionRegistry, Outbox, RegistryConfig, RegistryError,
};
