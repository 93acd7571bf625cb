//! Interface between the coordinator and the transport.
//!
//! The coordinator never touches sockets. It addresses outbound messages to a
//! [`ConnectionId`] and hands them to an [`Outbox`], which delivers them
//! fire-and-forget.

use crate::protocol::ServerMessage;
use serde::{Deserialize, Serialize};

/// Transport-assigned identifier of one live connection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[display("conn-{_0}")]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Outbound side of the transport.
pub trait Outbox: Send + Sync {
    /// Queues `message` for `connection`. Unknown or closed connections are
    /// ignored.
    fn send(&self, connection: ConnectionId, message: ServerMessage);
}
