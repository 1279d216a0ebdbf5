//! Connection Registry
//!
//! Authoritative mapping from live connection to its session state.
//! Every operation takes the map lock for its whole duration, so callers
//! never observe a half-applied update.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::messages::ServerMessage;

/// Opaque identifier of one transport session. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Outbound channel of a single connection
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Session state of one registered connection
#[derive(Debug, Clone)]
pub struct Connection {
    /// Short random id assigned at connect time
    pub user_id: String,
    /// Name announced via identify, absent until then
    pub display_name: Option<String>,
    /// Writer side of the connection's outbound queue
    pub outbox: Outbox,
}

impl Connection {
    /// Display name if set, otherwise the user id
    pub fn effective_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_id)
    }

    /// Whether identify stored a non-empty name; only those get a leave notice
    pub fn is_identified(&self) -> bool {
        self.display_name.as_deref().is_some_and(|name| !name.is_empty())
    }
}

/// Registry limits
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum display name length in characters
    pub max_username_len: usize,
    /// Length of generated user ids
    pub user_id_len: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_username_len: 32,
            user_id_len: 8,
        }
    }
}

/// Tracks every live connection
pub struct ConnectionRegistry {
    /// Active connections: ConnectionId → Connection
    connections: RwLock<BTreeMap<ConnectionId, Connection>>,
    next_id: AtomicU64,
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            connections: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Hand out a fresh connection id for a newly accepted transport session
    pub fn issue_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a connection and assign it a user id.
    ///
    /// Fails only if `id` is already present, which means the transport
    /// integration delivered two accepts for one session.
    pub async fn register(&self, id: ConnectionId, outbox: Outbox) -> Result<String, RegistryError> {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&id) {
            tracing::error!(connection_id = %id, "Connection registered twice");
            return Err(RegistryError::AlreadyRegistered(id));
        }

        let user_id = self.generate_user_id();
        connections.insert(
            id,
            Connection {
                user_id: user_id.clone(),
                display_name: None,
                outbox,
            },
        );

        tracing::debug!(connection_id = %id, user_id = %user_id, "Connection registered");
        Ok(user_id)
    }

    /// Current record for `id`, if still registered
    pub async fn lookup(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.read().await.get(&id).cloned()
    }

    /// Set the display name, truncated to the configured length.
    ///
    /// Returns the stored name, or `None` when `id` is no longer registered.
    pub async fn set_display_name(&self, id: ConnectionId, name: &str) -> Option<String> {
        let mut connections = self.connections.write().await;
        let connection = connections.get_mut(&id)?;

        let name = truncate_chars(name, self.config.max_username_len);
        connection.display_name = Some(name.clone());
        Some(name)
    }

    /// Remove and return the record. Safe to call more than once.
    pub async fn unregister(&self, id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.write().await.remove(&id);
        if removed.is_some() {
            tracing::debug!(connection_id = %id, "Connection unregistered");
        }
        removed
    }

    /// Point-in-time copy of all registered connections, in accept order
    pub async fn snapshot(&self) -> Vec<(ConnectionId, Connection)> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(id, conn)| (*id, conn.clone()))
            .collect()
    }

    /// Number of registered connections
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    fn generate_user_id(&self) -> String {
        Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(self.config.user_id_len)
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

/// Truncate to at most `max` characters without splitting a character
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Errors that can occur in the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}
