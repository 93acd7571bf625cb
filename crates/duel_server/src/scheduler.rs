//! Delayed removal of concluded matches.

use crate::hub::Command;
use duel_tictactoe::MatchId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};
use tokio::task::AbortHandle;
use tracing::{debug, instrument, warn};

/// Schedules and cancels per-match cleanup timers.
///
/// Both operations are idempotent: scheduling a match again replaces its
/// timer, and cancelling a match with no timer does nothing.
pub trait CleanupScheduler: Send {
    /// Arranges for `match_id` to expire after `delay`.
    fn schedule(&mut self, match_id: MatchId, delay: Duration);

    /// Drops the timer for `match_id`, if any.
    fn cancel(&mut self, match_id: MatchId);
}

/// Timer tasks on the tokio runtime that post [`Command::Expire`] back to the hub.
///
/// Timers hold a weak sender, so a pending timer never keeps the hub alive.
#[derive(Debug)]
pub struct TokioScheduler {
    commands: WeakUnboundedSender<Command>,
    timers: HashMap<MatchId, AbortHandle>,
}

impl TokioScheduler {
    /// Creates a scheduler posting to the hub behind `commands`.
    pub fn new(commands: &UnboundedSender<Command>) -> Self {
        Self {
            commands: commands.downgrade(),
            timers: HashMap::new(),
        }
    }

    /// Number of timers not yet cancelled.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl CleanupScheduler for TokioScheduler {
    #[instrument(skip(self), fields(%match_id))]
    fn schedule(&mut self, match_id: MatchId, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, cleanup left to the sweep");
            return;
        };

        let commands = self.commands.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::Expire(match_id));
            }
        });

        if let Some(previous) = self.timers.insert(match_id, task.abort_handle()) {
            debug!("Replacing existing cleanup timer");
            previous.abort();
        }
    }

    fn cancel(&mut self, match_id: MatchId) {
        if let Some(timer) = self.timers.remove(&match_id) {
            debug!(%match_id, "Cleanup timer cancelled");
            timer.abort();
        }
    }
}
