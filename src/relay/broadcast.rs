//! Fan-out over a registry snapshot.
//!
//! No lock is held while writing. A recipient that closed after the snapshot
//! was taken simply fails its own write; the loop carries on.

use metrics::counter;

use super::messages::ServerMessage;
use super::registry::{Connection, ConnectionId};
use crate::metrics::RELAY_DELIVERY_FAILURES_TOTAL;

/// Who receives a fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every connection in the snapshot
    Everyone,
    /// Every connection except the given one
    AllExcept(ConnectionId),
}

impl Audience {
    fn includes(&self, id: ConnectionId) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::AllExcept(excluded) => *excluded != id,
        }
    }
}

/// Deliver `message` to the snapshot members selected by `audience`.
///
/// Returns the number of successful deliveries.
pub fn fan_out(
    snapshot: &[(ConnectionId, Connection)],
    audience: Audience,
    message: &ServerMessage,
) -> usize {
    let mut delivered = 0;
    for (id, conn) in snapshot.iter().filter(|(id, _)| audience.includes(*id)) {
        if deliver(*id, conn, message.clone()) {
            delivered += 1;
        }
    }

    tracing::trace!(
        ?audience,
        system = message.is_system(),
        recipients = delivered,
        "Fan-out complete"
    );
    delivered
}

/// Write a single message to one connection, swallowing failure
pub fn deliver(id: ConnectionId, conn: &Connection, message: ServerMessage) -> bool {
    match conn.outbox.send(message) {
        Ok(()) => true,
        Err(_) => {
            counter!(RELAY_DELIVERY_FAILURES_TOTAL).increment(1);
            tracing::debug!(
                connection_id = %id,
                user_id = %conn.user_id,
                "Delivery failed, recipient already closed"
            );
            false
        }
    }
}
