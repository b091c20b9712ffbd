use chess::{Color, Piece, Square};
use log::info;
use std::time::Instant;
use uuid::Uuid;

use crate::game::animation::AnimationState;
use crate::game::clock::ClockState;
use crate::game::persistence::SavedSession;
use crate::game::position::PositionStore;
use crate::game::utils::{color_from_str, piece_from_letter};
use crate::game::Rejection;
use crate::models::session::{
    CapturedPieces, GameStatus, HistoryMove, MatchSession, SessionKind,
};

/// Settings a match is created with.
#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
    pub kind: SessionKind,
    pub player_color: Color,
    pub start_time_ms: u64,
    pub increment_ms: u64,
}

/// The outcome of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub record: HistoryMove,
    pub status: GameStatus,
}

/// The single mutation entry point for a match. Owns the session
/// aggregate, the clock and the animation lock; nothing else writes to
/// them. Created per connection and dropped with it — there is no
/// process-wide session state.
#[derive(Debug, Clone)]
pub struct MatchController {
    pub session: MatchSession,
    pub clock: ClockState,
    pub animation: AnimationState,
}

impl MatchController {
    pub fn new(config: &MatchConfig, now: Instant) -> Self {
        let position = PositionStore::new();
        let active = position.side_to_move();
        MatchController {
            session: MatchSession {
                id: Uuid::new_v4().to_string(),
                kind: config.kind,
                player_color: config.player_color,
                position,
                history: Vec::new(),
                captured: CapturedPieces::default(),
                status: GameStatus::Ongoing,
            },
            clock: ClockState::new(config.start_time_ms, config.increment_ms, active, now),
            animation: AnimationState::Idle,
        }
    }

    /// Rebuild a controller from a persisted snapshot. The position is
    /// replayed directly from its FEN (trusted, not re-validated move
    /// by move); the history is repopulated for display and the
    /// captured tallies recounted from it. Clocks restart fresh — the
    /// snapshot does not carry time.
    pub fn restore(saved: &SavedSession, config: &MatchConfig, now: Instant) -> Option<Self> {
        let position = PositionStore::from_fen(&saved.fen)?;
        let mut captured = CapturedPieces::default();
        for mv in &saved.moves {
            if let (Some(taker), Some(piece)) = (
                color_from_str(&mv.color),
                mv.captured.as_deref().and_then(piece_from_letter),
            ) {
                captured.push(taker, piece);
            }
        }
        let status = position.status();
        let active = position.side_to_move();
        Some(MatchController {
            session: MatchSession {
                id: Uuid::new_v4().to_string(),
                kind: config.kind,
                player_color: config.player_color,
                position,
                history: saved.moves.clone(),
                captured,
                status,
            },
            clock: ClockState::new(config.start_time_ms, config.increment_ms, active, now),
            animation: AnimationState::Idle,
        })
    }

    /// Validate and commit one move. Preconditions are checked in a
    /// fixed order before any state is touched; a rejection leaves the
    /// session, clock and animation byte-for-byte unchanged.
    ///
    /// On acceptance the side effects run in a fixed order too:
    /// history append, captured-piece update, clock charge + increment,
    /// turn flip, status recompute, animation lock. Persistence is the
    /// caller's final step.
    pub fn submit_move(
        &mut self,
        mover: Color,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
        now: Instant,
    ) -> Result<Committed, Rejection> {
        if self.animation.is_locked() {
            return Err(Rejection::Busy);
        }
        if self.session.position.side_to_move() != mover {
            return Err(Rejection::NotYourTurn);
        }
        if self.session.status.is_terminal() {
            return Err(Rejection::GameOver);
        }

        let applied = self.session.position.try_apply(from, to, promotion)?;
        let record = HistoryMove::from_applied(&applied);

        self.session.history.push(record.clone());
        if let Some(piece) = applied.captured {
            self.session.captured.push(mover, piece);
        }
        let flagged = self.clock.commit_move(mover, now);
        self.session.status = match flagged {
            Some(winner) => GameStatus::Timeout { winner },
            None => self.session.position.status(),
        };
        self.animation.try_lock(record.clone(), now);

        info!(
            "session {}: committed {} ({})",
            self.session.id,
            record.san,
            self.session.status.wire()
        );
        Ok(Committed {
            record,
            status: self.session.status,
        })
    }

    /// Recurring clock tick. Returns the new status when it turned the
    /// match terminal.
    pub fn tick(&mut self, now: Instant) -> Option<GameStatus> {
        if self.session.status.is_terminal() {
            return None;
        }
        if let Some(winner) = self.clock.tick(now) {
            self.session.status = GameStatus::Timeout { winner };
            return Some(self.session.status);
        }
        None
    }

    /// Stop the clock. Returns the new status if the charge up to
    /// `now` already crossed zero.
    pub fn pause(&mut self, now: Instant) -> Option<GameStatus> {
        if self.session.status.is_terminal() {
            return None;
        }
        if let Some(winner) = self.clock.pause(now) {
            self.session.status = GameStatus::Timeout { winner };
            return Some(self.session.status);
        }
        None
    }

    pub fn resume(&mut self, now: Instant) {
        if !self.session.status.is_terminal() {
            self.clock.resume(now);
        }
    }

    /// Concede the match. Terminal, with the opponent as winner.
    pub fn resign(&mut self, resigner: Color, now: Instant) -> GameStatus {
        if !self.session.status.is_terminal() {
            self.session.status = GameStatus::Resigned { winner: !resigner };
            self.clock.pause(now);
            info!(
                "session {}: {:?} resigned",
                self.session.id, resigner
            );
        }
        self.session.status
    }

    /// Whether the engine worker owes a move right now.
    pub fn engine_to_move(&self) -> bool {
        self.session.kind == SessionKind::Bot
            && !self.session.status.is_terminal()
            && self.session.position.side_to_move() != self.session.player_color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::broker::{parse_bestmove, EngineBroker};
    use crate::engine::search;
    use crate::game::utils::parse_square;

    fn bot_config() -> MatchConfig {
        MatchConfig {
            kind: SessionKind::Bot,
            player_color: Color::White,
            start_time_ms: 300_000,
            increment_ms: 5_000,
        }
    }

    fn human_config() -> MatchConfig {
        MatchConfig {
            kind: SessionKind::Human,
            ..bot_config()
        }
    }

    fn submit(
        controller: &mut MatchController,
        mover: Color,
        from: &str,
        to: &str,
        now: Instant,
    ) -> Result<Committed, Rejection> {
        controller.submit_move(
            mover,
            parse_square(from).unwrap(),
            parse_square(to).unwrap(),
            None,
            now,
        )
    }

    /// Everything a rejection must leave untouched.
    fn fingerprint(controller: &MatchController) -> (String, usize, ClockState, CapturedPieces, GameStatus) {
        (
            controller.session.position.fen(),
            controller.session.history.len(),
            controller.clock.clone(),
            controller.session.captured.clone(),
            controller.session.status,
        )
    }

    #[test]
    fn accepted_move_grows_history_and_flips_turn() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(&human_config(), t0);
        let committed = submit(&mut controller, Color::White, "e2", "e4", t0).unwrap();
        assert_eq!(committed.record.san, "e4");
        assert_eq!(controller.session.history.len(), 1);
        assert_eq!(controller.session.turn_color(), Color::Black);
        assert!(controller.animation.is_locked());
    }

    #[test]
    fn every_rejection_class_is_side_effect_free() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(&human_config(), t0);

        // Illegal move.
        let before = fingerprint(&controller);
        assert_eq!(
            submit(&mut controller, Color::White, "e2", "e5", t0),
            Err(Rejection::IllegalMove)
        );
        assert_eq!(fingerprint(&controller), before);

        // Wrong turn.
        let before = fingerprint(&controller);
        assert_eq!(
            submit(&mut controller, Color::Black, "e7", "e5", t0),
            Err(Rejection::NotYourTurn)
        );
        assert_eq!(fingerprint(&controller), before);

        // Busy: commit a move, leave the animation lock held.
        submit(&mut controller, Color::White, "e2", "e4", t0).unwrap();
        let before = fingerprint(&controller);
        assert_eq!(
            submit(&mut controller, Color::Black, "e7", "e5", t0),
            Err(Rejection::Busy)
        );
        assert_eq!(fingerprint(&controller), before);

        // Game over.
        controller.animation.unlock();
        controller.resign(Color::Black, t0);
        let before = fingerprint(&controller);
        assert_eq!(
            submit(&mut controller, Color::Black, "e7", "e5", t0),
            Err(Rejection::GameOver)
        );
        assert_eq!(fingerprint(&controller), before);
    }

    #[test]
    fn busy_clears_after_unlock_and_a_legal_move_then_succeeds() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(&human_config(), t0);
        submit(&mut controller, Color::White, "e2", "e4", t0).unwrap();
        assert_eq!(
            submit(&mut controller, Color::Black, "e7", "e5", t0),
            Err(Rejection::Busy)
        );
        controller.animation.unlock();
        assert!(submit(&mut controller, Color::Black, "e7", "e5", t0).is_ok());
        assert_eq!(controller.session.history.len(), 2);
    }

    #[test]
    fn increment_lands_on_the_mover() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(&human_config(), t0);
        let t1 = t0 + std::time::Duration::from_secs(2);
        submit(&mut controller, Color::White, "e2", "e4", t1).unwrap();
        // 300s - 2s thinking + 5s increment.
        assert_eq!(controller.clock.remaining(Color::White), 303_000);
        assert_eq!(controller.clock.remaining(Color::Black), 300_000);
    }

    #[test]
    fn capture_updates_the_takers_tally() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(&human_config(), t0);
        for (mover, from, to) in [
            (Color::White, "e2", "e4"),
            (Color::Black, "d7", "d5"),
            (Color::White, "e4", "d5"),
        ] {
            controller.animation.unlock();
            submit(&mut controller, mover, from, to, t0).unwrap();
        }
        assert_eq!(controller.session.captured.by_white, vec![Piece::Pawn]);
        assert!(controller.session.captured.by_black.is_empty());
    }

    #[test]
    fn clock_expiry_through_tick_is_terminal() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(
            &MatchConfig {
                start_time_ms: 1_000,
                increment_ms: 0,
                ..human_config()
            },
            t0,
        );
        let status = controller.tick(t0 + std::time::Duration::from_secs(2));
        assert_eq!(
            status,
            Some(GameStatus::Timeout {
                winner: Color::Black
            })
        );
        assert_eq!(controller.clock.remaining(Color::White), 0);
        // Terminal: further ticks report nothing and nothing decrements.
        assert_eq!(controller.tick(t0 + std::time::Duration::from_secs(5)), None);
        assert_eq!(controller.clock.remaining(Color::Black), 1_000);
        assert_eq!(
            submit(&mut controller, Color::White, "e2", "e4", t0),
            Err(Rejection::GameOver)
        );
    }

    #[test]
    fn resign_ends_the_match_with_the_opponent_winning() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(&bot_config(), t0);
        let status = controller.resign(Color::White, t0);
        assert_eq!(
            status,
            GameStatus::Resigned {
                winner: Color::Black
            }
        );
        // Resigning twice does not flip the winner.
        assert_eq!(controller.resign(Color::Black, t0), status);
    }

    #[test]
    fn engine_owes_a_move_only_on_its_turn_in_bot_sessions() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(&bot_config(), t0);
        assert!(!controller.engine_to_move());
        submit(&mut controller, Color::White, "e2", "e4", t0).unwrap();
        controller.animation.unlock();
        assert!(controller.engine_to_move());

        let mut human = MatchController::new(&human_config(), t0);
        submit(&mut human, Color::White, "e2", "e4", t0).unwrap();
        human.animation.unlock();
        assert!(!human.engine_to_move());
    }

    /// End-to-end: player plays e2e4, the broker issues a request for
    /// the resulting position, the engine answers, and its move commits
    /// through the pipeline exactly like a human move.
    #[test]
    fn engine_reply_commits_identically_to_a_human_move() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(&bot_config(), t0);
        let mut broker = EngineBroker::new();

        submit(&mut controller, Color::White, "e2", "e4", t0).unwrap();
        assert_eq!(controller.session.history.len(), 1);
        assert_eq!(controller.session.turn_color(), Color::Black);
        controller.animation.unlock();
        assert!(controller.engine_to_move());

        let request_id = broker.issue();
        let board = controller.session.position.board();
        let reply = match search::best_move(&board, 2) {
            Some(mv) => format!("bestmove {}", mv),
            None => "bestmove (none)".to_string(),
        };
        assert!(broker.accepts(request_id));
        broker.complete(request_id);

        let mv = parse_bestmove(&reply).unwrap();
        let committed = controller
            .submit_move(
                Color::Black,
                mv.get_source(),
                mv.get_dest(),
                mv.get_promotion(),
                t0,
            )
            .unwrap();
        assert_eq!(controller.session.history.len(), 2);
        assert_eq!(controller.session.turn_color(), Color::White);
        assert_eq!(committed.record.color, "black");
    }

    /// A reply to a superseded request must never reach the session.
    #[test]
    fn stale_engine_reply_is_dropped_before_touching_the_session() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(&bot_config(), t0);
        let mut broker = EngineBroker::new();

        submit(&mut controller, Color::White, "e2", "e4", t0).unwrap();
        controller.animation.unlock();
        let first = broker.issue();
        // A newer request supersedes the first before it resolves.
        let second = broker.issue();

        let fen_before = controller.session.position.fen();
        // The slow answer to the first request finally arrives; the
        // broker refuses it and the session is never consulted.
        assert!(!broker.accepts(first));
        assert_eq!(controller.session.position.fen(), fen_before);
        assert!(broker.accepts(second));
    }

    /// An engine move whose commit was deferred by the animation lock
    /// must still pass the request gate when it finally fires: a new
    /// game in between supersedes the request, so the deferred move is
    /// refused instead of landing on the new session.
    #[test]
    fn deferred_engine_commit_is_refused_after_a_new_game() {
        let t0 = Instant::now();
        let mut controller = MatchController::new(&bot_config(), t0);
        let mut broker = EngineBroker::new();

        submit(&mut controller, Color::White, "e2", "e4", t0).unwrap();
        let request_id = broker.issue();
        // The reply lands while the commit window is still closing; the
        // commit is deferred and the request stays live across retries.
        assert!(controller.animation.is_locked());
        assert!(broker.accepts(request_id));

        // A new game replaces the session and supersedes the broker
        // before the deferred commit fires.
        broker.supersede();
        let fresh = MatchController::new(&bot_config(), t0);
        assert!(!broker.accepts(request_id));
        assert!(fresh.session.history.is_empty());
    }
}
