//! HTTP and WebSocket surface.

use crate::config::ServerConfig;
use crate::coordinator::Coordinator;
use crate::hub::{self, CoordinatorHandle};
use crate::notifier::{LogSink, ResultSink, TelegramSink};
use crate::outbox::{ConnectionId, Outbox};
use crate::protocol::{self, ServerMessage, Stats};
use crate::registry::ConnectionRegistry;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Shared state handed to every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    coordinator: CoordinatorHandle,
    connections: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Builds the coordinator and spawns its hub. Must run inside a tokio runtime.
    #[instrument(skip_all)]
    pub fn start(config: &ServerConfig, results: Arc<dyn ResultSink>) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let (coordinator, commands) = CoordinatorHandle::channel();
        let core = Coordinator::new(
            connections.clone(),
            results,
            Box::new(coordinator.scheduler()),
            config.cleanup_grace(),
        );
        hub::spawn(core, commands, config.sweep_interval());
        info!(
            grace_secs = config.cleanup_grace_secs(),
            sweep_secs = config.sweep_interval_secs(),
            "Coordinator started"
        );

        Self {
            coordinator,
            connections,
        }
    }

    /// Handle to the hub.
    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    /// Open connections.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }
}

/// Picks the result sink for `config`: Telegram when configured, log otherwise.
pub fn result_sink(config: &ServerConfig) -> Arc<dyn ResultSink> {
    match config.telegram() {
        Some(telegram) => {
            info!("Result notifications via Telegram");
            Arc::new(TelegramSink::new(telegram))
        }
        None => Arc::new(LogSink),
    }
}

/// Routes: `/ws`, `/health`, `/stats`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

/// Binds, serves until Ctrl-C, then shuts down gracefully.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    config.validate()?;
    let state = AppState::start(&config, result_sink(&config));

    let listener = TcpListener::bind((config.host().as_str(), *config.port())).await?;
    info!(addr = %listener.local_addr()?, "Server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now(),
    }))
}

async fn stats(State(state): State<AppState>) -> Result<Json<Stats>, StatusCode> {
    state
        .coordinator
        .stats()
        .await
        .map(Json)
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Runs one connection: a writer task drains the outbound queue while this
/// task decodes inbound frames and forwards them to the hub.
async fn handle_socket(state: AppState, socket: WebSocket) {
    let (connection, outbound) = state.connections.register();
    info!(%connection, "WebSocket connected");
    state.coordinator.open(connection);

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_frames(connection, sink, outbound));

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match protocol::decode(text.as_str()) {
                Ok(message) => state.coordinator.submit(connection, message),
                Err(e) => {
                    warn!(%connection, error = %e, "Undecodable frame");
                    state.connections.send(
                        connection,
                        ServerMessage::ValidationError {
                            message: e.to_string(),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(%connection, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    state.coordinator.close(connection);
    state.connections.remove(connection);
    if let Err(e) = writer.await {
        warn!(%connection, error = %e, "Writer task failed");
    }
    info!(%connection, "WebSocket disconnected");
}

async fn write_frames(
    connection: ConnectionId,
    mut sink: futures_util::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(message) = outbound.recv().await {
        let text = match protocol::encode(&message) {
            Ok(text) => text,
            Err(e) => {
                error!(%connection, error = %e, "Failed to encode message");
                continue;
            }
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
            debug!(%connection, "Socket closed while writing");
            break;
        }
    }
    let _ = sink.close().await;
}

