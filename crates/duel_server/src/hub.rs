//! The hub: a single task that owns the [`Coordinator`].
//!
//! Connections, timers and HTTP handlers never touch coordinator state
//! directly. They post [`Command`]s through a [`CoordinatorHandle`], and the
//! hub applies them one at a time, each to completion.

use crate::coordinator::Coordinator;
use crate::outbox::ConnectionId;
use crate::protocol::{ClientMessage, Stats};
use crate::scheduler::TokioScheduler;
use chrono::Utc;
use duel_tictactoe::MatchId;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

/// Work items processed by the hub.
#[derive(Debug)]
pub enum Command {
    /// A connection opened.
    Open(ConnectionId),
    /// A decoded intent arrived on a connection.
    Intent(ConnectionId, ClientMessage),
    /// A connection closed.
    Close(ConnectionId),
    /// A cleanup timer fired.
    Expire(MatchId),
    /// Read the current counters.
    Stats(oneshot::Sender<Stats>),
}

/// Cloneable sender side of the hub.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    /// Creates a handle and the receiver the hub will drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        (Self { commands }, receiver)
    }

    /// Cleanup scheduler that posts back into this hub.
    pub fn scheduler(&self) -> TokioScheduler {
        TokioScheduler::new(&self.commands)
    }

    /// Reports a new connection.
    pub fn open(&self, connection: ConnectionId) {
        self.post(Command::Open(connection));
    }

    /// Forwards a decoded intent.
    pub fn submit(&self, connection: ConnectionId, message: ClientMessage) {
        self.post(Command::Intent(connection, message));
    }

    /// Reports a closed connection.
    pub fn close(&self, connection: ConnectionId) {
        self.post(Command::Close(connection));
    }

    /// Asks the hub for its counters. `None` once the hub has stopped.
    pub async fn stats(&self) -> Option<Stats> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Stats(reply)).is_err() {
            return None;
        }
        response.await.ok()
    }

    /// Checks whether the hub has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn post(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Hub stopped, command dropped");
        }
    }
}

/// Spawns the hub task. It runs until every [`CoordinatorHandle`] is dropped.
pub fn spawn(
    coordinator: Coordinator,
    commands: mpsc::UnboundedReceiver<Command>,
    sweep_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(run(coordinator, commands, sweep_interval))
}

/// Hub loop: applies commands in arrival order and sweeps on an interval.
#[instrument(skip_all, fields(sweep_secs = sweep_interval.as_secs()))]
pub async fn run(
    mut coordinator: Coordinator,
    mut commands: mpsc::UnboundedReceiver<Command>,
    sweep_interval: Duration,
) {
    info!("Hub started");
    let mut sweep = tokio::time::interval_at(Instant::now() + sweep_interval, sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => dispatch(&mut coordinator, command),
                None => break,
            },
            _ = sweep.tick() => {
                guarded("sweep", || coordinator.sweep(Utc::now()));
            }
        }
    }

    info!("Hub stopped");
}

fn dispatch(coordinator: &mut Coordinator, command: Command) {
    match command {
        Command::Open(connection) => {
            guarded("open", || coordinator.open(connection));
        }
        Command::Intent(connection, message) => {
            let event = message.event();
            if !guarded(event, || coordinator.handle(connection, message)) {
                debug!(%connection, "Answering failed intent");
                guarded("fault", || coordinator.fault(connection));
            }
        }
        Command::Close(connection) => {
            guarded("close", || coordinator.disconnect(connection));
        }
        Command::Expire(match_id) => {
            guarded("expire", || coordinator.expire_match(match_id));
        }
        Command::Stats(reply) => {
            let _ = reply.send(coordinator.stats());
        }
    }
}

/// Runs `task`, containing any panic to this one command. Returns whether it
/// completed.
fn guarded(task: &str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(_) => {
            error!(task, "Hub task panicked");
            false
        }
    }
}
