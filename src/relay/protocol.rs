//! Relay protocol state machine.
//!
//! A connection starts unidentified, may identify (any number of times),
//! may chat in either state, and ends when the transport closes. Each
//! handler takes a fresh registry lookup; nothing is cached across events.

use metrics::{counter, gauge};

use super::broadcast::{deliver, fan_out, Audience};
use super::messages::{ClientMessage, Inbound, ServerMessage};
use super::registry::{
    Connection, ConnectionId, ConnectionRegistry, Outbox, RegistryConfig, RegistryError,
};
use crate::metrics::{
    RELAY_CONNECTIONS_ACTIVE, RELAY_CONNECTIONS_TOTAL, RELAY_MALFORMED_FRAMES_TOTAL,
    RELAY_MESSAGES_TOTAL,
};

/// What happened to one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Payload could not be decoded; dropped
    Malformed,
    /// Decoded but not a known kind; dropped silently
    Ignored,
    /// The connection was already gone when the frame was handled
    Stale,
    /// Display name stored; welcome sent and others notified
    Identified {
        /// Name as stored (after truncation)
        name: String,
        /// Number of other connections that got the joined notice
        notified: usize,
    },
    /// Chat line fanned out
    Broadcast {
        /// Number of connections that got the line, sender included
        recipients: usize,
    },
}

/// Chat relay: registry plus the rules for reacting to events
pub struct Relay {
    registry: ConnectionRegistry,
}

impl Relay {
    /// Create a relay with an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(config),
        }
    }

    /// Read access to the registry (observability)
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.registry.count().await
    }

    /// Accept a new transport session.
    ///
    /// Returns the connection id and the generated user id.
    pub async fn connect(&self, outbox: Outbox) -> Result<(ConnectionId, String), RegistryError> {
        self.accept(self.registry.issue_id(), outbox).await
    }

    /// Accept a transport session under an id the caller already holds.
    ///
    /// Registering an id twice is a bug in the caller; debug builds panic.
    pub async fn accept(
        &self,
        id: ConnectionId,
        outbox: Outbox,
    ) -> Result<(ConnectionId, String), RegistryError> {
        let registered = self.registry.register(id, outbox).await;
        debug_assert!(registered.is_ok(), "connection {id} already registered");
        let user_id = registered?;

        counter!(RELAY_CONNECTIONS_TOTAL).increment(1);
        gauge!(RELAY_CONNECTIONS_ACTIVE).increment(1.0);

        tracing::info!(connection_id = %id, user_id = %user_id, "Client connected");
        Ok((id, user_id))
    }

    /// Process one raw inbound frame from connection `id`
    pub async fn handle_frame(&self, id: ConnectionId, raw: &[u8]) -> FrameOutcome {
        let inbound = match Inbound::decode(raw) {
            Ok(inbound) => inbound,
            Err(e) => {
                counter!(RELAY_MALFORMED_FRAMES_TOTAL).increment(1);
                tracing::warn!(connection_id = %id, error = %e, "Received non-JSON message");
                return FrameOutcome::Malformed;
            }
        };

        let message = match inbound {
            Inbound::Recognized(message) => message,
            Inbound::Unrecognized => {
                tracing::debug!(connection_id = %id, "Ignoring unrecognized message");
                return FrameOutcome::Ignored;
            }
        };

        counter!(RELAY_MESSAGES_TOTAL, "kind" => message.kind()).increment(1);

        match message {
            ClientMessage::Identify { username } => self.identify(id, &username).await,
            ClientMessage::Message { text } => self.chat(id, text).await,
        }
    }

    /// Tear down connection `id`. Returns false if it was already gone.
    pub async fn disconnect(&self, id: ConnectionId) -> bool {
        let Some(conn) = self.registry.unregister(id).await else {
            return false;
        };

        gauge!(RELAY_CONNECTIONS_ACTIVE).decrement(1.0);

        if conn.is_identified() {
            let snapshot = self.registry.snapshot().await;
            fan_out(&snapshot, Audience::Everyone, &ServerMessage::left(conn.effective_name()));
        }

        tracing::info!(
            connection_id = %id,
            user_id = %conn.user_id,
            name = %conn.effective_name(),
            "Client disconnected"
        );
        true
    }

    async fn identify(&self, id: ConnectionId, username: &str) -> FrameOutcome {
        let Some(name) = self.registry.set_display_name(id, username).await else {
            return FrameOutcome::Stale;
        };

        let snapshot = self.registry.snapshot().await;
        self.announce(id, name, &snapshot)
    }

    /// Welcome `id` and tell everyone else in `snapshot` that `name` joined
    fn announce(
        &self,
        id: ConnectionId,
        name: String,
        snapshot: &[(ConnectionId, Connection)],
    ) -> FrameOutcome {
        let Some((_, me)) = snapshot.iter().find(|(member, _)| *member == id) else {
            // closed between the rename and the snapshot
            return FrameOutcome::Stale;
        };

        deliver(id, me, ServerMessage::welcome(&name));
        let notified = fan_out(snapshot, Audience::AllExcept(id), &ServerMessage::joined(&name));

        tracing::info!(connection_id = %id, user_id = %me.user_id, name = %name, "Client identified");
        FrameOutcome::Identified { name, notified }
    }

    async fn chat(&self, id: ConnectionId, text: String) -> FrameOutcome {
        let Some(sender) = self.registry.lookup(id).await else {
            return FrameOutcome::Stale;
        };

        tracing::debug!(connection_id = %id, user_id = %sender.user_id, text = %text, "Message received");

        let line = ServerMessage::chat(&sender.user_id, sender.effective_name(), text);
        let snapshot = self.registry.snapshot().await;
        let recipients = fan_out(&snapshot, Audience::Everyone, &line);

        FrameOutcome::Broadcast { recipients }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    struct Client {
        id: ConnectionId,
        user_id: String,
        rx: mpsc::UnboundedReceiver<ServerMessage>,
    }

    impl Client {
        /// Everything queued for this client so far, as JSON
        fn drain(&mut self) -> Vec<Value> {
            let mut out = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push(serde_json::to_value(msg).unwrap());
            }
            out
        }
    }

    async fn connect(relay: &Relay) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let (id, user_id) = relay.connect(tx).await.unwrap();
        Client { id, user_id, rx }
    }

    #[tokio::test]
    async fn test_scenario_chat_identify_leave() {
        let relay = Relay::default();
        let mut a = connect(&relay).await;
        let mut b = connect(&relay).await;

        let outcome = relay
            .handle_frame(a.id, br#"{"type":"message","text":"hi"}"#)
            .await;
        assert_eq!(outcome, FrameOutcome::Broadcast { recipients: 2 });

        let expected = json!({"id": a.user_id, "username": a.user_id, "message": "hi", "system": false});
        assert_eq!(a.drain(), vec![expected.clone()]);
        assert_eq!(b.drain(), vec![expected]);

        let outcome = relay
            .handle_frame(b.id, br#"{"type":"identify","username":"Bob"}"#)
            .await;
        assert_eq!(
            outcome,
            FrameOutcome::Identified {
                name: "Bob".to_string(),
                notified: 1
            }
        );
        assert_eq!(b.drain(), vec![json!({"system": true, "message": "Hello Bob!"})]);
        assert_eq!(a.drain(), vec![json!({"system": true, "message": "Bob joined the chat"})]);

        assert!(relay.disconnect(b.id).await);
        assert_eq!(a.drain(), vec![json!({"system": true, "message": "Bob left the chat"})]);
        assert_eq!(relay.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_unidentified_leave_is_silent() {
        let relay = Relay::default();
        let mut a = connect(&relay).await;
        let b = connect(&relay).await;

        assert!(relay.disconnect(b.id).await);
        assert!(a.drain().is_empty());
    }

    #[tokio::test]
    async fn test_empty_username_joins_but_leaves_silently() {
        let relay = Relay::default();
        let mut a = connect(&relay).await;
        let mut b = connect(&relay).await;

        let outcome = relay
            .handle_frame(b.id, br#"{"type":"identify","username":""}"#)
            .await;
        assert_eq!(
            outcome,
            FrameOutcome::Identified {
                name: String::new(),
                notified: 1
            }
        );
        assert_eq!(b.drain(), vec![json!({"system": true, "message": "Hello !"})]);
        assert_eq!(a.drain(), vec![json!({"system": true, "message": " joined the chat"})]);

        relay
            .handle_frame(b.id, br#"{"type":"message","text":"psst"}"#)
            .await;
        assert_eq!(
            a.drain(),
            vec![json!({"id": b.user_id, "username": "", "message": "psst", "system": false})]
        );

        assert!(relay.disconnect(b.id).await);
        assert!(a.drain().is_empty());
    }

    #[tokio::test]
    async fn test_identify_then_message_uses_name() {
        let relay = Relay::default();
        let mut a = connect(&relay).await;

        relay
            .handle_frame(a.id, br#"{"type":"identify","username":"Alice"}"#)
            .await;
        a.drain();

        relay
            .handle_frame(a.id, br#"{"type":"message","text":"hi"}"#)
            .await;
        assert_eq!(
            a.drain(),
            vec![json!({"id": a.user_id, "username": "Alice", "message": "hi", "system": false})]
        );
    }

    #[tokio::test]
    async fn test_identify_never_notifies_self() {
        let relay = Relay::default();
        let mut a = connect(&relay).await;
        let mut b = connect(&relay).await;
        let mut c = connect(&relay).await;

        relay
            .handle_frame(a.id, br#"{"type":"identify","username":"Alice"}"#)
            .await;

        let own = a.drain();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0], json!({"system": true, "message": "Hello Alice!"}));

        let joined = json!({"system": true, "message": "Alice joined the chat"});
        assert_eq!(b.drain(), vec![joined.clone()]);
        assert_eq!(c.drain(), vec![joined]);
    }

    #[tokio::test]
    async fn test_long_username_truncated_everywhere() {
        let relay = Relay::default();
        let mut a = connect(&relay).await;
        let mut b = connect(&relay).await;

        let long = "n".repeat(40);
        let frame = json!({"type": "identify", "username": long}).to_string();
        let outcome = relay.handle_frame(a.id, frame.as_bytes()).await;

        let short = "n".repeat(32);
        assert_eq!(
            outcome,
            FrameOutcome::Identified {
                name: short.clone(),
                notified: 1
            }
        );
        assert_eq!(a.drain()[0]["message"], format!("Hello {}!", short));
        assert_eq!(b.drain()[0]["message"], format!("{} joined the chat", short));

        relay
            .handle_frame(a.id, br#"{"type":"message","text":"x"}"#)
            .await;
        assert_eq!(b.drain()[0]["username"], short);

        relay.disconnect(a.id).await;
        assert_eq!(b.drain()[0]["message"], format!("{} left the chat", short));
    }

    #[tokio::test]
    async fn test_reidentify_renames() {
        let relay = Relay::default();
        let mut a = connect(&relay).await;
        let mut b = connect(&relay).await;

        relay
            .handle_frame(a.id, br#"{"type":"identify","username":"Alice"}"#)
            .await;
        relay
            .handle_frame(a.id, br#"{"type":"identify","username":"Alicia"}"#)
            .await;
        a.drain();

        let notices = b.drain();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1]["message"], "Alicia joined the chat");

        relay
            .handle_frame(a.id, br#"{"type":"message","text":"hey"}"#)
            .await;
        assert_eq!(b.drain()[0]["username"], "Alicia");
    }

    #[tokio::test]
    async fn test_malformed_frame_changes_nothing() {
        let relay = Relay::default();
        let mut a = connect(&relay).await;
        let mut b = connect(&relay).await;

        assert_eq!(relay.handle_frame(a.id, b"{not json").await, FrameOutcome::Malformed);
        assert_eq!(relay.handle_frame(a.id, &[0xc3, 0x28]).await, FrameOutcome::Malformed);

        assert!(a.drain().is_empty());
        assert!(b.drain().is_empty());
        assert_eq!(relay.connection_count().await, 2);
        assert!(relay.registry().lookup(a.id).await.unwrap().display_name.is_none());
    }

    #[tokio::test]
    async fn test_unknown_kind_ignored() {
        let relay = Relay::default();
        let mut a = connect(&relay).await;

        assert_eq!(
            relay.handle_frame(a.id, br#"{"type":"typing"}"#).await,
            FrameOutcome::Ignored
        );
        assert_eq!(
            relay
                .handle_frame(a.id, br#"{"type":"identify","username":null}"#)
                .await,
            FrameOutcome::Ignored
        );
        assert!(a.drain().is_empty());
    }

    #[tokio::test]
    async fn test_stale_handle_short_circuits() {
        let relay = Relay::default();
        let a = connect(&relay).await;
        let mut b = connect(&relay).await;
        relay.disconnect(a.id).await;

        assert_eq!(
            relay
                .handle_frame(a.id, br#"{"type":"message","text":"late"}"#)
                .await,
            FrameOutcome::Stale
        );
        assert_eq!(
            relay
                .handle_frame(a.id, br#"{"type":"identify","username":"Ghost"}"#)
                .await,
            FrameOutcome::Stale
        );
        assert!(b.drain().is_empty());
    }

    #[tokio::test]
    async fn test_identify_racing_close_sends_nothing() {
        let relay = Relay::default();
        let mut a = connect(&relay).await;
        let mut b = connect(&relay).await;

        // rename lands, then the close wins before the snapshot is taken
        let name = relay.registry().set_display_name(a.id, "Alice").await.unwrap();
        assert!(relay.disconnect(a.id).await);
        let snapshot = relay.registry().snapshot().await;

        assert_eq!(relay.announce(a.id, name, &snapshot), FrameOutcome::Stale);
        assert!(a.drain().is_empty());
        assert_eq!(b.drain(), vec![json!({"system": true, "message": "Alice left the chat"})]);
    }

    #[tokio::test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "already registered")]
    async fn test_duplicate_accept_fails_loudly() {
        let relay = Relay::default();
        let a = connect(&relay).await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let _ = relay.accept(a.id, tx).await;
    }

    #[tokio::test]
    #[cfg(not(debug_assertions))]
    async fn test_duplicate_accept_rejected() {
        let relay = Relay::default();
        let a = connect(&relay).await;

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            relay.accept(a.id, tx).await,
            Err(RegistryError::AlreadyRegistered(id)) if id == a.id
        ));
        assert_eq!(relay.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_disconnect_is_idempotent() {
        let relay = Relay::default();
        let a = connect(&relay).await;
        let mut b = connect(&relay).await;

        relay
            .handle_frame(a.id, br#"{"type":"identify","username":"Alice"}"#)
            .await;
        b.drain();

        assert!(relay.disconnect(a.id).await);
        assert!(!relay.disconnect(a.id).await);

        // exactly one leave notice
        assert_eq!(b.drain().len(), 1);
        assert_eq!(relay.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_closed_recipient_does_not_block_others() {
        let relay = Relay::default();
        let a = connect(&relay).await;
        let mut b = connect(&relay).await;
        let c = connect(&relay).await;

        // c's transport went away without a close event yet
        drop(c.rx);

        let outcome = relay
            .handle_frame(a.id, br#"{"type":"message","text":"still here"}"#)
            .await;
        assert_eq!(outcome, FrameOutcome::Broadcast { recipients: 2 });
        assert_eq!(b.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_count_tracks_connects_minus_closes() {
        let relay = std::sync::Arc::new(Relay::default());

        let mut handles = Vec::new();
        for i in 0..16 {
            let relay = std::sync::Arc::clone(&relay);
            handles.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::unbounded_channel();
                let (id, _) = relay.connect(tx).await.unwrap();
                relay
                    .handle_frame(id, br#"{"type":"message","text":"x"}"#)
                    .await;
                if i % 2 == 0 {
                    relay.disconnect(id).await;
                    relay.disconnect(id).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(relay.connection_count().await, 8);
    }
}
