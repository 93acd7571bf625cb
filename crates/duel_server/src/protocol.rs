//! JSON wire protocol.
//!
//! Every frame is an adjacently tagged object, `{"event": <name>, "data": <payload>}`,
//! with camelCase names for events and fields alike.

use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use duel_tictactoe::{MatchSnapshot, PlayerId, PlayerResult};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Intents sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Enter matchmaking, or rejoin the current match.
    Join {
        /// Caller-supplied identity.
        #[serde(default)]
        player_id: PlayerId,
        /// Display name.
        #[serde(default)]
        player_name: String,
    },
    /// Claim a cell.
    Move {
        /// Mover.
        #[serde(default)]
        player_id: PlayerId,
        /// Cell index, 0-8 in row-major order.
        position: i64,
    },
    /// Leave the current match and the queue.
    LeaveRequest {
        /// Leaving player.
        #[serde(default)]
        player_id: PlayerId,
    },
    /// Ask for the current match snapshot.
    StateQuery {
        /// Asking player.
        #[serde(default)]
        player_id: PlayerId,
    },
    /// Ask for coordinator counters.
    StatsQuery,
    /// Send a chat line to the current match.
    Chat {
        /// Sender.
        #[serde(default)]
        player_id: PlayerId,
        /// Text.
        #[serde(default)]
        message: String,
    },
}

impl ClientMessage {
    /// Event name, for logging.
    pub fn event(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Move { .. } => "move",
            Self::LeaveRequest { .. } => "leaveRequest",
            Self::StateQuery { .. } => "stateQuery",
            Self::StatsQuery => "statsQuery",
            Self::Chat { .. } => "chat",
        }
    }
}

/// Point-in-time coordinator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Live matches, including concluded ones still within their grace period.
    pub active_matches: usize,
    /// Players waiting in the queue.
    pub waiting_players: usize,
    /// Placed plus waiting players.
    pub total_players: usize,
}

/// Notifications sent to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Greeting sent when the connection opens.
    Connected {
        /// Greeting text.
        message: String,
        /// Server time.
        timestamp: DateTime<Utc>,
    },
    /// Queued, no opponent yet.
    WaitingForOpponent,
    /// Paired; sent to both participants.
    MatchStarted(MatchSnapshot),
    /// A move was accepted; sent to all participants.
    MatchUpdated(MatchSnapshot),
    /// Reply to a rejoin or state query.
    MatchState(MatchSnapshot),
    /// Reply to a state query from a player with no match.
    NoActiveMatch,
    /// The recipient's own result; sent once per participant on conclusion.
    MatchResult(PlayerResult),
    /// The opponent left the match.
    OpponentLeft,
    /// The opponent's connection closed.
    OpponentDisconnected,
    /// Reply to a stats query.
    StatsSnapshot(Stats),
    /// The intent was malformed or referred to nothing.
    ValidationError {
        /// Human-readable reason.
        message: String,
    },
    /// The match refused the move.
    MoveRejected {
        /// Stable machine code.
        code: String,
        /// Human-readable reason.
        error: String,
    },
    /// Chat line within a match.
    ChatMessage {
        /// Sender's display name.
        player_name: String,
        /// Trimmed text.
        message: String,
        /// Server time.
        timestamp: DateTime<Utc>,
    },
    /// The intent failed inside the server.
    ServerError {
        /// Generic reason.
        message: String,
    },
}

/// Frame could not be decoded or encoded.
#[derive(Debug, Display, Error)]
#[display("Invalid message: {source}")]
pub struct ProtocolError {
    source: serde_json::Error,
}

impl From<serde_json::Error> for ProtocolError {
    fn from(source: serde_json::Error) -> Self {
        Self { source }
    }
}

/// Decodes a text frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] for malformed JSON, unknown events, and payloads
/// of the wrong shape.
#[instrument(level = "trace", skip(text), fields(len = text.len()))]
pub fn decode(text: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Encodes an outbound message as a text frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] if serialization fails.
pub fn encode(message: &ServerMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}
