//! Duel server - matchmaking and live play for two-player tic-tac-toe
//!
//! Players connect over a WebSocket, are paired first come first served, and
//! play matches whose rules live in [`duel_tictactoe`].
//!
//! # Architecture
//!
//! - **Queue**: FIFO of players waiting for an opponent
//! - **Directory**: player to connection and player to match mappings, plus the match arena
//! - **Coordinator**: synchronous intent handling over queue and directory
//! - **Hub**: the single task that owns the coordinator; everything else posts commands to it
//! - **Server**: axum routes for `/ws`, `/health` and `/stats`
//!
//! # Example
//!
//! ```no_run
//! use duel_server::{AppState, ServerConfig, result_sink, router};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::default().with_port(0);
//! let state = AppState::start(&config, result_sink(&config));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! axum::serve(listener, router(state)).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod coordinator;
mod directory;
mod error;
mod hub;
mod notifier;
mod outbox;
mod protocol;
mod queue;
mod registry;
mod scheduler;
mod server;

// Crate-level exports - Configuration
pub use config::{ConfigError, ServerConfig, TelegramConfig};

// Crate-level exports - Coordination
pub use coordinator::{Coordinator, MAX_CHAT_CHARS};
pub use directory::{SessionDirectory, Vacancy};
pub use error::{DirectoryError, IntentError};
pub use hub::{Command, CoordinatorHandle};
pub use queue::{MatchmakingQueue, WaitingEntry};
pub use scheduler::{CleanupScheduler, TokioScheduler};

// Crate-level exports - Transport
pub use outbox::{ConnectionId, Outbox};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage, Stats, decode, encode};
pub use registry::ConnectionRegistry;
pub use server::{AppState, result_sink, router, serve};

// Crate-level exports - Notifications
pub use notifier::{LogSink, ResultSink, TelegramSink, result_text};
