//! Live connection registry backing the [`Outbox`].

use crate::outbox::{ConnectionId, Outbox};
use crate::protocol::ServerMessage;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Outbound queues of every open connection.
///
/// Each connection owns an unbounded channel drained by its writer task;
/// sending never blocks the caller.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    senders: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id and an outbound queue for a new connection.
    #[instrument(skip(self))]
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders.insert(id, sender);
        debug!(connection = %id, open = self.senders.len(), "Connection registered");
        (id, receiver)
    }

    /// Drops the outbound queue, ending the writer once it drains.
    #[instrument(skip(self))]
    pub fn remove(&self, connection: ConnectionId) {
        if self.senders.remove(&connection).is_some() {
            debug!(open = self.senders.len(), "Connection removed");
        }
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Checks whether no connection is open.
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl Outbox for ConnectionRegistry {
    fn send(&self, connection: ConnectionId, message: ServerMessage) {
        match self.senders.get(&connection) {
            Some(sender) => {
                if sender.send(message).is_err() {
                    debug!(%connection, "Writer gone, message dropped");
                }
            }
            None => debug!(%connection, "Unknown connection, message dropped"),
        }
    }
}
