//! Session coordinator: turns intents into state changes and notifications.
//!
//! The coordinator is plain synchronous code. It owns the matchmaking queue
//! and the session directory, and reaches the outside world only through
//! three seams: an [`Outbox`] for client messages, a [`ResultSink`] for final
//! results, and a [`CleanupScheduler`] for delayed match removal. The hub
//! drives it one command at a time.

use crate::directory::{SessionDirectory, Vacancy};
use crate::error::IntentError;
use crate::notifier::ResultSink;
use crate::outbox::{ConnectionId, Outbox};
use crate::protocol::{ClientMessage, ServerMessage, Stats};
use crate::queue::{MatchmakingQueue, WaitingEntry};
use crate::scheduler::CleanupScheduler;
use chrono::{DateTime, TimeDelta, Utc};
use duel_tictactoe::{Match, MatchId, PlayerRef, PlayerResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Longest accepted chat line, in characters.
pub const MAX_CHAT_CHARS: usize = 500;

const GREETING: &str = "Connected to tic-tac-toe server";

/// Orchestrates queue, directory and matches.
pub struct Coordinator {
    queue: MatchmakingQueue,
    directory: SessionDirectory,
    outbox: Arc<dyn Outbox>,
    results: Arc<dyn ResultSink>,
    scheduler: Box<dyn CleanupScheduler>,
    grace: Duration,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("queue", &self.queue)
            .field("directory", &self.directory)
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Creates a coordinator with empty queue and directory.
    pub fn new(
        outbox: Arc<dyn Outbox>,
        results: Arc<dyn ResultSink>,
        scheduler: Box<dyn CleanupScheduler>,
        grace: Duration,
    ) -> Self {
        Self {
            queue: MatchmakingQueue::new(),
            directory: SessionDirectory::new(),
            outbox,
            results,
            scheduler,
            grace,
        }
    }

    /// Matchmaking queue.
    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    /// Session directory.
    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    /// Greets a new connection.
    #[instrument(skip(self))]
    pub fn open(&mut self, connection: ConnectionId) {
        debug!("Connection opened");
        self.outbox.send(
            connection,
            ServerMessage::Connected {
                message: GREETING.to_string(),
                timestamp: Utc::now(),
            },
        );
    }

    /// Applies one intent from `connection`. Failures are answered on the
    /// same connection and leave state untouched.
    #[instrument(skip(self, message), fields(%connection, event = message.event()))]
    pub fn handle(&mut self, connection: ConnectionId, message: ClientMessage) {
        let outcome = match message {
            ClientMessage::Join {
                player_id,
                player_name,
            } => self.join(connection, &player_id, &player_name),
            ClientMessage::Move {
                player_id,
                position,
            } => self.make_move(&player_id, position),
            ClientMessage::LeaveRequest { player_id } => self.leave(&player_id),
            ClientMessage::StateQuery { player_id } => self.state_query(connection, &player_id),
            ClientMessage::StatsQuery => {
                self.outbox
                    .send(connection, ServerMessage::StatsSnapshot(self.stats()));
                Ok(())
            }
            ClientMessage::Chat { player_id, message } => self.chat(&player_id, &message),
        };

        if let Err(err) = outcome {
            self.reply_error(connection, err);
        }
    }

    /// Answers a failed intent with a generic server error.
    pub fn fault(&self, connection: ConnectionId) {
        self.reply_error(
            connection,
            IntentError::Internal("request could not be processed".to_string()),
        );
    }

    fn reply_error(&self, connection: ConnectionId, err: IntentError) {
        let reply = match err {
            IntentError::Rejected(rejection) => {
                warn!(%connection, code = rejection.code(), %rejection, "Move rejected");
                ServerMessage::MoveRejected {
                    code: rejection.code().to_string(),
                    error: rejection.to_string(),
                }
            }
            IntentError::Validation(_) | IntentError::NoMatch => {
                warn!(%connection, error = %err, "Intent refused");
                ServerMessage::ValidationError {
                    message: err.to_string(),
                }
            }
            IntentError::Internal(detail) => {
                error!(%connection, %detail, "Internal error while handling intent");
                ServerMessage::ServerError {
                    message: "Internal server error".to_string(),
                }
            }
        };
        self.outbox.send(connection, reply);
    }

    /// Enters matchmaking, or replays the current match to a returning player.
    #[instrument(skip(self), fields(%connection))]
    pub fn join(
        &mut self,
        connection: ConnectionId,
        player_id: &str,
        player_name: &str,
    ) -> Result<(), IntentError> {
        let player_name = player_name.trim();
        if player_id.trim().is_empty() || player_name.is_empty() {
            return Err(IntentError::validation("Player ID and name are required"));
        }

        if let Some(previous) = self
            .directory
            .player_on(connection)
            .filter(|previous| previous.as_str() != player_id)
            .cloned()
        {
            debug!(%previous, "Connection switched identity, dropping previous queue entry");
            self.queue.remove(&previous);
        }
        self.directory.bind(player_id, connection);

        if let Some(game) = self.directory.current_match(player_id) {
            info!(match_id = %game.id(), phase = %game.phase(), "Player rejoined match");
            self.outbox
                .send(connection, ServerMessage::MatchState(game.snapshot()));
            return Ok(());
        }

        self.queue
            .enqueue(WaitingEntry::new(PlayerRef::new(player_id, player_name), connection));
        info!(waiting = self.queue.len(), "Player queued");

        match self.queue.try_pair() {
            Some((first, second)) => self.start_match(first, second),
            None => {
                self.outbox.send(connection, ServerMessage::WaitingForOpponent);
                Ok(())
            }
        }
    }

    fn start_match(&mut self, first: WaitingEntry, second: WaitingEntry) -> Result<(), IntentError> {
        let created = Match::new(first.player.clone(), second.player.clone())
            .and_then(|mut game| game.start().map(|()| game));
        let game = match created {
            Ok(game) => game,
            Err(e) => {
                self.queue.restore(first, second);
                return Err(IntentError::Internal(e.to_string()));
            }
        };

        let match_id = self.directory.insert_match(game);
        let placed = self
            .directory
            .place_in_match(&first.player.id, match_id)
            .and_then(|()| self.directory.place_in_match(&second.player.id, match_id));
        if let Err(e) = placed {
            self.directory.remove_match(match_id);
            self.queue.restore(first, second);
            return Err(e.into());
        }

        info!(
            %match_id,
            x = %first.player.id,
            o = %second.player.id,
            "Match started"
        );
        if let Some(game) = self.directory.get_match(&match_id) {
            self.broadcast(match_id, ServerMessage::MatchStarted(game.snapshot()));
        }
        Ok(())
    }

    /// Plays `position` for `player_id` in their current match.
    #[instrument(skip(self))]
    pub fn make_move(&mut self, player_id: &str, position: i64) -> Result<(), IntentError> {
        if player_id.trim().is_empty() {
            return Err(IntentError::validation("Player ID is required"));
        }
        let match_id = self.directory.match_of(player_id).ok_or(IntentError::NoMatch)?;
        let game = self
            .directory
            .get_match_mut(&match_id)
            .ok_or(IntentError::NoMatch)?;

        let cell = usize::try_from(position).unwrap_or(usize::MAX);
        let snapshot = game.apply_move(player_id, cell)?;
        let concluded = game.is_concluded();

        self.broadcast(match_id, ServerMessage::MatchUpdated(snapshot));
        if concluded {
            self.conclude(match_id);
        }
        Ok(())
    }

    fn conclude(&mut self, match_id: MatchId) {
        let now = Utc::now();
        let deliveries: Vec<(PlayerRef, PlayerResult)> = match self.directory.get_match(&match_id) {
            Some(game) => game
                .seats()
                .iter()
                .filter_map(|seat| {
                    game.result_at(&seat.player.id, now)
                        .map(|result| (seat.player.clone(), result))
                })
                .collect(),
            None => return,
        };

        for (player, result) in &deliveries {
            if self.directory.is_placed_in(&player.id, match_id) {
                self.send_to_player(&player.id, ServerMessage::MatchResult(*result));
            }
            self.results.deliver(player, result);
        }

        info!(%match_id, grace_secs = self.grace.as_secs(), "Cleanup scheduled");
        self.scheduler.schedule(match_id, self.grace);
    }

    /// Leaves the current match and the queue.
    #[instrument(skip(self))]
    pub fn leave(&mut self, player_id: &str) -> Result<(), IntentError> {
        if player_id.trim().is_empty() {
            return Err(IntentError::validation("Player ID is required"));
        }

        if let Some(match_id) = self.directory.match_of(player_id) {
            self.notify_opponent(match_id, player_id, ServerMessage::OpponentLeft);
            self.vacate(player_id);
            info!(%match_id, "Player left match");
        }
        if self.queue.remove(player_id).is_some() {
            info!("Player left queue");
        }
        Ok(())
    }

    /// Handles a closed connection.
    #[instrument(skip(self))]
    pub fn disconnect(&mut self, connection: ConnectionId) {
        let Some(player_id) = self.directory.player_on(connection).cloned() else {
            debug!("Closed connection had no bound player");
            return;
        };
        self.directory.unbind(&player_id);

        if let Some(game) = self.directory.current_match(&player_id) {
            let match_id = game.id();
            if !game.is_concluded() {
                self.notify_opponent(match_id, &player_id, ServerMessage::OpponentDisconnected);
            }
            self.vacate(&player_id);
        }
        self.queue.remove(&player_id);

        let stats = self.stats();
        info!(
            %player_id,
            active_matches = stats.active_matches,
            waiting_players = stats.waiting_players,
            "Player disconnected"
        );
    }

    /// Replies with the player's match, or that there is none.
    #[instrument(skip(self))]
    pub fn state_query(&self, connection: ConnectionId, player_id: &str) -> Result<(), IntentError> {
        if player_id.trim().is_empty() {
            return Err(IntentError::validation("Player ID is required"));
        }
        let reply = match self.directory.current_match(player_id) {
            Some(game) => ServerMessage::MatchState(game.snapshot()),
            None => ServerMessage::NoActiveMatch,
        };
        self.outbox.send(connection, reply);
        Ok(())
    }

    /// Relays a chat line to everyone in the sender's match.
    #[instrument(skip(self, text))]
    pub fn chat(&self, player_id: &str, text: &str) -> Result<(), IntentError> {
        if player_id.trim().is_empty() {
            return Err(IntentError::validation("Player ID is required"));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(IntentError::validation("Message is empty"));
        }
        if text.chars().count() > MAX_CHAT_CHARS {
            return Err(IntentError::validation(format!(
                "Message exceeds {MAX_CHAT_CHARS} characters"
            )));
        }

        let match_id = self.directory.match_of(player_id).ok_or(IntentError::NoMatch)?;
        let player_name = self
            .directory
            .get_match(&match_id)
            .and_then(|game| game.seat_of(player_id))
            .map(|seat| seat.player.name.clone())
            .ok_or(IntentError::NoMatch)?;

        self.broadcast(
            match_id,
            ServerMessage::ChatMessage {
                player_name,
                message: text.to_string(),
                timestamp: Utc::now(),
            },
        );
        Ok(())
    }

    /// Removes a match once its grace period has passed. A match already gone
    /// is ignored.
    #[instrument(skip(self))]
    pub fn expire_match(&mut self, match_id: MatchId) {
        self.scheduler.cancel(match_id);
        match self.directory.remove_match(match_id) {
            Some(_) => info!("Match removed"),
            None => debug!("Match already removed"),
        }
    }

    /// Logs counters and removes concluded matches whose grace period has
    /// elapsed by `now`.
    #[instrument(skip(self))]
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let stats = self.stats();
        info!(
            active_matches = stats.active_matches,
            waiting_players = stats.waiting_players,
            total_players = stats.total_players,
            "Server stats"
        );

        let Some(cutoff) = TimeDelta::from_std(self.grace)
            .ok()
            .and_then(|grace| now.checked_sub_signed(grace))
        else {
            return;
        };
        for match_id in self.directory.concluded_before(cutoff) {
            debug!(%match_id, "Sweeping expired match");
            self.expire_match(match_id);
        }
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> Stats {
        let waiting_players = self.queue.len();
        Stats {
            active_matches: self.directory.match_count(),
            waiting_players,
            total_players: self.directory.placed_count() + waiting_players,
        }
    }

    fn vacate(&mut self, player_id: &str) {
        if let Vacancy::Discarded(match_id) = self.directory.vacate(player_id) {
            self.scheduler.cancel(match_id);
        }
    }

    fn broadcast(&self, match_id: MatchId, message: ServerMessage) {
        let Some(game) = self.directory.get_match(&match_id) else {
            return;
        };
        for seat in game.seats() {
            if self.directory.is_placed_in(&seat.player.id, match_id) {
                self.send_to_player(&seat.player.id, message.clone());
            }
        }
    }

    fn notify_opponent(&self, match_id: MatchId, player_id: &str, message: ServerMessage) {
        let Some(opponent) = self
            .directory
            .get_match(&match_id)
            .and_then(|game| game.opponent_of(player_id))
        else {
            return;
        };
        if self.directory.is_placed_in(&opponent.player.id, match_id) {
            self.send_to_player(&opponent.player.id, message);
        }
    }

    fn send_to_player(&self, player_id: &str, message: ServerMessage) {
        match self.directory.connection_of(player_id) {
            Some(connection) => self.outbox.send(connection, message),
            None => debug!(%player_id, "Player offline, message dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_tictactoe::{Mark, Outcome, Phase, ResultKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingOutbox {
        sent: Mutex<Vec<(ConnectionId, ServerMessage)>>,
    }

    impl Outbox for RecordingOutbox {
        fn send(&self, connection: ConnectionId, message: ServerMessage) {
            self.sent.lock().unwrap().push((connection, message));
        }
    }

    impl RecordingOutbox {
        fn take(&self) -> Vec<(ConnectionId, ServerMessage)> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<(String, PlayerResult)>>,
    }

    impl ResultSink for RecordingSink {
        fn deliver(&self, player: &PlayerRef, result: &PlayerResult) {
            self.delivered.lock().unwrap().push((player.id.clone(), *result));
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Timer {
        Scheduled(MatchId, Duration),
        Cancelled(MatchId),
    }

    #[derive(Clone, Default)]
    struct RecordingScheduler {
        calls: Arc<Mutex<Vec<Timer>>>,
    }

    impl CleanupScheduler for RecordingScheduler {
        fn schedule(&mut self, match_id: MatchId, delay: Duration) {
            self.calls.lock().unwrap().push(Timer::Scheduled(match_id, delay));
        }

        fn cancel(&mut self, match_id: MatchId) {
            self.calls.lock().unwrap().push(Timer::Cancelled(match_id));
        }
    }

    struct Harness {
        coordinator: Coordinator,
        outbox: Arc<RecordingOutbox>,
        sink: Arc<RecordingSink>,
        timers: Arc<Mutex<Vec<Timer>>>,
    }

    const A: ConnectionId = ConnectionId::new(1);
    const B: ConnectionId = ConnectionId::new(2);
    const C: ConnectionId = ConnectionId::new(3);

    fn harness() -> Harness {
        let outbox = Arc::new(RecordingOutbox::default());
        let sink = Arc::new(RecordingSink::default());
        let scheduler = RecordingScheduler::default();
        let timers = Arc::clone(&scheduler.calls);
        let coordinator = Coordinator::new(
            outbox.clone(),
            sink.clone(),
            Box::new(scheduler),
            Duration::from_secs(5),
        );
        Harness {
            coordinator,
            outbox,
            sink,
            timers,
        }
    }

    fn join(h: &mut Harness, connection: ConnectionId, id: &str, name: &str) {
        h.coordinator.handle(
            connection,
            ClientMessage::Join {
                player_id: id.into(),
                player_name: name.into(),
            },
        );
    }

    fn play(h: &mut Harness, connection: ConnectionId, id: &str, position: i64) {
        h.coordinator.handle(
            connection,
            ClientMessage::Move {
                player_id: id.into(),
                position,
            },
        );
    }

    fn paired(h: &mut Harness) -> MatchId {
        join(h, A, "p1", "Ann");
        join(h, B, "p2", "Bob");
        h.outbox.take();
        h.coordinator.directory().match_of("p1").expect("p1 placed")
    }

    #[test]
    fn test_first_join_waits() {
        let mut h = harness();
        join(&mut h, A, "p1", "Ann");
        assert_eq!(h.outbox.take(), vec![(A, ServerMessage::WaitingForOpponent)]);
        assert_eq!(h.coordinator.queue().player_ids(), ["p1"]);
    }

    #[test]
    fn test_double_join_single_entry() {
        let mut h = harness();
        join(&mut h, A, "p1", "Ann");
        join(&mut h, A, "p1", "Ann");
        assert_eq!(h.coordinator.queue().len(), 1);
        assert_eq!(h.coordinator.stats().total_players, 1);
    }

    #[test]
    fn test_join_requires_id_and_name() {
        let mut h = harness();
        join(&mut h, A, "", "Ann");
        join(&mut h, A, "p1", "   ");
        let sent = h.outbox.take();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(conn, message)| *conn == A
            && matches!(message, ServerMessage::ValidationError { .. })));
        assert!(h.coordinator.queue().is_empty());
    }

    #[test]
    fn test_pairing_notifies_both() {
        let mut h = harness();
        join(&mut h, A, "p1", "Ann");
        h.outbox.take();
        join(&mut h, B, "p2", "Bob");

        let sent = h.outbox.take();
        assert_eq!(sent.len(), 2);
        let recipients: Vec<ConnectionId> = sent.iter().map(|(conn, _)| *conn).collect();
        assert_eq!(recipients, [A, B]);
        for (_, message) in &sent {
            let ServerMessage::MatchStarted(snapshot) = message else {
                panic!("expected matchStarted, got {message:?}");
            };
            assert_eq!(snapshot.slot_a.id, "p1");
            assert_eq!(snapshot.slot_a.symbol, Mark::X);
            assert_eq!(snapshot.slot_b.id, "p2");
            assert_eq!(snapshot.current_player.id, "p1");
            assert_eq!(snapshot.phase, Phase::Active);
        }
        assert!(h.coordinator.queue().is_empty());
        assert_eq!(h.coordinator.stats(), Stats {
            active_matches: 1,
            waiting_players: 0,
            total_players: 2,
        });
    }

    #[test]
    fn test_fifo_pairing_leaves_third_waiting() {
        let mut h = harness();
        join(&mut h, A, "p1", "Ann");
        join(&mut h, B, "p2", "Bob");
        join(&mut h, C, "p3", "Cat");
        assert_eq!(h.coordinator.queue().player_ids(), ["p3"]);
        assert!(h.coordinator.directory().match_of("p3").is_none());
    }

    #[test]
    fn test_winning_scenario() {
        let mut h = harness();
        let match_id = paired(&mut h);

        for (conn, id, cell) in [(A, "p1", 0), (B, "p2", 4), (A, "p1", 1), (B, "p2", 5)] {
            play(&mut h, conn, id, cell);
        }
        h.outbox.take();
        play(&mut h, A, "p1", 2);

        let sent = h.outbox.take();
        let updates: Vec<_> = sent
            .iter()
            .filter_map(|(conn, message)| match message {
                ServerMessage::MatchUpdated(snapshot) => Some((*conn, snapshot)),
                _ => None,
            })
            .collect();
        assert_eq!(updates.len(), 2);
        let snapshot = updates[0].1;
        assert_eq!(snapshot.outcome, Some(Outcome::Winner(Mark::X)));
        assert_eq!(snapshot.winning_line, Some([0, 1, 2]));
        assert_eq!(snapshot.phase, Phase::Concluded);

        let results: Vec<(ConnectionId, ResultKind)> = sent
            .iter()
            .filter_map(|(conn, message)| match message {
                ServerMessage::MatchResult(result) => Some((*conn, result.result)),
                _ => None,
            })
            .collect();
        assert_eq!(results, [(A, ResultKind::Win), (B, ResultKind::Lose)]);

        let delivered = h.sink.delivered.lock().unwrap().clone();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].0, "p1");
        assert_eq!(delivered[0].1.result, ResultKind::Win);
        assert_eq!(delivered[1].1.result, ResultKind::Lose);

        assert_eq!(
            *h.timers.lock().unwrap(),
            [Timer::Scheduled(match_id, Duration::from_secs(5))]
        );
    }

    #[test]
    fn test_rejected_move_goes_to_requester_only() {
        let mut h = harness();
        paired(&mut h);

        play(&mut h, B, "p2", 0);
        assert_eq!(
            h.outbox.take(),
            vec![(
                B,
                ServerMessage::MoveRejected {
                    code: "not_your_turn".into(),
                    error: duel_tictactoe::MoveError::NotYourTurn.to_string(),
                }
            )]
        );

        play(&mut h, A, "p1", 0);
        h.outbox.take();
        play(&mut h, B, "p2", 0);
        let sent = h.outbox.take();
        assert!(matches!(
            &sent[..],
            [(conn, ServerMessage::MoveRejected { code, .. })] if *conn == B && code == "cell_occupied"
        ));

        play(&mut h, B, "p2", 9);
        play(&mut h, B, "p2", -3);
        let codes: Vec<String> = h
            .outbox
            .take()
            .into_iter()
            .filter_map(|(_, message)| match message {
                ServerMessage::MoveRejected { code, .. } => Some(code),
                _ => None,
            })
            .collect();
        assert_eq!(codes, ["out_of_range", "out_of_range"]);
    }

    #[test]
    fn test_move_without_match_is_validation_error() {
        let mut h = harness();
        join(&mut h, A, "p1", "Ann");
        h.outbox.take();
        play(&mut h, A, "p1", 0);
        assert_eq!(
            h.outbox.take(),
            vec![(
                A,
                ServerMessage::ValidationError {
                    message: "Match not found".into()
                }
            )]
        );
    }

    #[test]
    fn test_disconnect_notifies_opponent_once() {
        let mut h = harness();
        let match_id = paired(&mut h);

        h.coordinator.disconnect(A);
        h.coordinator.disconnect(A);

        assert_eq!(h.outbox.take(), vec![(B, ServerMessage::OpponentDisconnected)]);
        assert!(h.coordinator.directory().match_of("p1").is_none());
        assert_eq!(h.coordinator.directory().match_of("p2"), Some(match_id));
        assert!(h.coordinator.directory().connection_of("p1").is_none());
    }

    #[test]
    fn test_disconnect_both_discards_match() {
        let mut h = harness();
        let match_id = paired(&mut h);
        h.coordinator.disconnect(A);
        h.coordinator.disconnect(B);
        assert_eq!(h.coordinator.stats(), Stats::default());
        assert_eq!(*h.timers.lock().unwrap(), [Timer::Cancelled(match_id)]);
        // Second disconnect has nobody left to notify
        assert_eq!(h.outbox.take(), vec![(B, ServerMessage::OpponentDisconnected)]);
    }

    #[test]
    fn test_disconnect_after_conclusion_is_silent() {
        let mut h = harness();
        paired(&mut h);
        for (conn, id, cell) in [(A, "p1", 0), (B, "p2", 3), (A, "p1", 1), (B, "p2", 4), (A, "p1", 2)] {
            play(&mut h, conn, id, cell);
        }
        h.outbox.take();
        h.coordinator.disconnect(A);
        assert!(h.outbox.take().is_empty());
    }

    #[test]
    fn test_disconnect_while_waiting_dequeues() {
        let mut h = harness();
        join(&mut h, A, "p1", "Ann");
        h.coordinator.disconnect(A);
        assert!(h.coordinator.queue().is_empty());
        h.coordinator.disconnect(ConnectionId::new(99));
    }

    #[test]
    fn test_late_close_of_replaced_connection_is_noop() {
        let mut h = harness();
        let match_id = paired(&mut h);

        join(&mut h, C, "p1", "Ann");
        let sent = h.outbox.take();
        assert!(matches!(&sent[..], [(conn, ServerMessage::MatchState(s))] if *conn == C && s.id == match_id));

        h.coordinator.disconnect(A);
        assert!(h.outbox.take().is_empty());
        assert_eq!(h.coordinator.directory().match_of("p1"), Some(match_id));
        assert_eq!(h.coordinator.directory().connection_of("p1"), Some(C));
    }

    #[test]
    fn test_leave_notifies_opponent_and_vacates() {
        let mut h = harness();
        let match_id = paired(&mut h);

        h.coordinator.handle(A, ClientMessage::LeaveRequest { player_id: "p1".into() });
        assert_eq!(h.outbox.take(), vec![(B, ServerMessage::OpponentLeft)]);
        assert!(h.coordinator.directory().match_of("p1").is_none());

        h.coordinator.handle(B, ClientMessage::LeaveRequest { player_id: "p2".into() });
        assert!(h.outbox.take().is_empty());
        assert!(h.coordinator.directory().get_match(&match_id).is_none());
        assert_eq!(*h.timers.lock().unwrap(), [Timer::Cancelled(match_id)]);
    }

    #[test]
    fn test_leave_from_queue() {
        let mut h = harness();
        join(&mut h, A, "p1", "Ann");
        h.coordinator.handle(A, ClientMessage::LeaveRequest { player_id: "p1".into() });
        assert!(h.coordinator.queue().is_empty());
    }

    #[test]
    fn test_state_query() {
        let mut h = harness();
        h.coordinator.handle(C, ClientMessage::StateQuery { player_id: "p9".into() });
        assert_eq!(h.outbox.take(), vec![(C, ServerMessage::NoActiveMatch)]);

        let match_id = paired(&mut h);
        h.coordinator.handle(A, ClientMessage::StateQuery { player_id: "p1".into() });
        let sent = h.outbox.take();
        assert!(matches!(&sent[..], [(conn, ServerMessage::MatchState(s))] if *conn == A && s.id == match_id));
    }

    #[test]
    fn test_stats_query_replies_to_requester() {
        let mut h = harness();
        join(&mut h, A, "p1", "Ann");
        h.outbox.take();
        h.coordinator.handle(C, ClientMessage::StatsQuery);
        assert_eq!(
            h.outbox.take(),
            vec![(
                C,
                ServerMessage::StatsSnapshot(Stats {
                    active_matches: 0,
                    waiting_players: 1,
                    total_players: 1,
                })
            )]
        );
    }

    #[test]
    fn test_chat_broadcast_and_validation() {
        let mut h = harness();
        paired(&mut h);

        h.coordinator.handle(
            B,
            ClientMessage::Chat {
                player_id: "p2".into(),
                message: "  good luck  ".into(),
            },
        );
        let sent = h.outbox.take();
        assert_eq!(sent.len(), 2);
        for (_, message) in &sent {
            let ServerMessage::ChatMessage { player_name, message, .. } = message else {
                panic!("expected chat, got {message:?}");
            };
            assert_eq!(player_name, "Bob");
            assert_eq!(message, "good luck");
        }

        h.coordinator.handle(
            A,
            ClientMessage::Chat {
                player_id: "p1".into(),
                message: "x".repeat(MAX_CHAT_CHARS + 1),
            },
        );
        h.coordinator.handle(
            C,
            ClientMessage::Chat {
                player_id: "nobody".into(),
                message: "hi".into(),
            },
        );
        let sent = h.outbox.take();
        assert!(matches!(sent[0], (conn, ServerMessage::ValidationError { .. }) if conn == A));
        assert!(matches!(sent[1], (conn, ServerMessage::ValidationError { .. }) if conn == C));
    }

    #[test]
    fn test_expire_removes_match_and_is_idempotent() {
        let mut h = harness();
        let match_id = paired(&mut h);
        h.coordinator.expire_match(match_id);
        h.coordinator.expire_match(match_id);
        assert_eq!(h.coordinator.stats(), Stats::default());
        assert!(h.coordinator.directory().match_of("p2").is_none());
    }

    #[test]
    fn test_rejoin_during_grace_replays_final_board() {
        let mut h = harness();
        let match_id = paired(&mut h);
        for (conn, id, cell) in [(A, "p1", 0), (B, "p2", 3), (A, "p1", 1), (B, "p2", 4), (A, "p1", 2)] {
            play(&mut h, conn, id, cell);
        }
        h.outbox.take();

        join(&mut h, A, "p1", "Ann");
        let sent = h.outbox.take();
        assert!(matches!(
            &sent[..],
            [(conn, ServerMessage::MatchState(s))]
                if *conn == A && s.id == match_id && s.phase == Phase::Concluded
        ));
        assert!(h.coordinator.queue().is_empty());

        // Leaving frees both players to queue for a fresh match
        h.coordinator.handle(A, ClientMessage::LeaveRequest { player_id: "p1".into() });
        h.coordinator.handle(B, ClientMessage::LeaveRequest { player_id: "p2".into() });
        assert!(h.coordinator.directory().get_match(&match_id).is_none());

        join(&mut h, A, "p1", "Ann");
        join(&mut h, B, "p2", "Bob");
        let new_match = h.coordinator.directory().match_of("p2").expect("paired again");
        assert_ne!(new_match, match_id);
    }

    #[test]
    fn test_pairing_rolls_back_when_placement_fails() {
        let mut h = harness();
        join(&mut h, A, "p1", "Ann");

        // Stale placement: p1 waits in the queue while still seated elsewhere
        let stale = Match::new(PlayerRef::new("p1", "Ann"), PlayerRef::new("p9", "Zed"))
            .expect("distinct players");
        let stale_id = h.coordinator.directory.insert_match(stale);
        h.coordinator
            .directory
            .place_in_match("p1", stale_id)
            .expect("seed placement");
        h.outbox.take();

        join(&mut h, B, "p2", "Bob");

        let sent = h.outbox.take();
        assert!(matches!(
            &sent[..],
            [(conn, ServerMessage::ServerError { .. })] if *conn == B
        ));
        assert_eq!(h.coordinator.queue().player_ids(), ["p1", "p2"]);
        assert_eq!(h.coordinator.directory().match_count(), 1);
        assert_eq!(h.coordinator.directory().match_of("p1"), Some(stale_id));
        assert!(h.coordinator.directory().match_of("p2").is_none());
        assert!(h.timers.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sweep_removes_expired_concluded_matches() {
        let mut h = harness();
        let match_id = paired(&mut h);
        for (conn, id, cell) in [(A, "p1", 0), (B, "p2", 3), (A, "p1", 1), (B, "p2", 4), (A, "p1", 2)] {
            play(&mut h, conn, id, cell);
        }

        h.coordinator.sweep(Utc::now());
        assert!(h.coordinator.directory().get_match(&match_id).is_some());

        h.coordinator.sweep(Utc::now() + TimeDelta::seconds(10));
        assert!(h.coordinator.directory().get_match(&match_id).is_none());
    }

    #[test]
    fn test_fault_replies_server_error() {
        let h = harness();
        h.coordinator.fault(A);
        assert!(matches!(
            &h.outbox.take()[..],
            [(conn, ServerMessage::ServerError { .. })] if *conn == A
        ));
    }
}
