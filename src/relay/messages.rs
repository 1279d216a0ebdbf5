//! Relay Message Types
//!
//! Wire formats exchanged with chat clients. Inbound frames are classified
//! into a closed set of kinds; anything outside that set is ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Announce a display name
    Identify {
        /// Requested display name (truncated on store)
        username: String,
    },
    /// Chat text to broadcast to everyone
    Message {
        /// Message body
        text: String,
    },
}

impl ClientMessage {
    /// Metric label for this message kind
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Identify { .. } => "identify",
            ClientMessage::Message { .. } => "message",
        }
    }
}

/// Result of classifying one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A recognized message kind
    Recognized(ClientMessage),
    /// Structured payload that is not one of the known kinds
    Unrecognized,
}

impl Inbound {
    /// Decode and classify a raw frame.
    ///
    /// Only payloads that are not UTF-8 JSON are errors. Valid JSON with an
    /// unknown `type`, a missing `type`, or wrongly typed fields is
    /// `Unrecognized`.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)?;
        let value: serde_json::Value = serde_json::from_str(text)?;

        Ok(match serde_json::from_value::<ClientMessage>(value) {
            Ok(msg) => Inbound::Recognized(msg),
            Err(_) => Inbound::Unrecognized,
        })
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Chat line relayed from a client
    Chat {
        /// Sender's user id
        id: String,
        /// Sender's effective display name at send time
        username: String,
        /// Message body
        message: String,
        /// Always false for chat lines
        system: bool,
    },
    /// Notice generated by the relay itself
    System {
        /// Always true for notices
        system: bool,
        /// Notice text
        message: String,
    },
}

impl ServerMessage {
    /// Chat line from `user_id` labelled with `username`
    pub fn chat(user_id: impl Into<String>, username: impl Into<String>, text: impl Into<String>) -> Self {
        ServerMessage::Chat {
            id: user_id.into(),
            username: username.into(),
            message: text.into(),
            system: false,
        }
    }

    /// Relay-generated notice
    pub fn system(message: impl Into<String>) -> Self {
        ServerMessage::System {
            system: true,
            message: message.into(),
        }
    }

    /// Private greeting sent to a connection after it identifies
    pub fn welcome(name: &str) -> Self {
        Self::system(format!("Hello {}!", name))
    }

    /// Notice to everyone else that `name` identified
    pub fn joined(name: &str) -> Self {
        Self::system(format!("{} joined the chat", name))
    }

    /// Notice to the remaining connections that `name` left
    pub fn left(name: &str) -> Self {
        Self::system(format!("{} left the chat", name))
    }

    /// Whether this message was generated by the relay
    pub fn is_system(&self) -> bool {
        matches!(self, ServerMessage::System { .. })
    }
}

/// Frame decoding failures
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("Frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
