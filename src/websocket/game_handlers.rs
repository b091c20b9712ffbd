use actix::prelude::*;
use actix_web_actors::ws;
use chess::{ChessMove, Color};
use log::{debug, info, warn};
use std::time::Instant;

use crate::engine::broker::{go_command, parse_bestmove, DEFAULT_SEARCH_DEPTH, ENGINE_BUDGET};
use crate::engine::worker::EngineCommand;
use crate::game::animation::ANIMATION_WINDOW;
use crate::game::persistence;
use crate::game::pipeline::{Committed, MatchConfig, MatchController};
use crate::game::utils::{color_to_string, parse_square, promotion_from_wire};
use crate::game::Rejection;
use crate::models::messages::ClientMessage;
use crate::models::session::SessionKind;
use crate::websocket::handler::MatchSocket;

/// Bounds on the client-supplied time control, applied before the
/// millisecond conversion so hostile values cannot overflow it.
const MAX_START_MINUTES: u64 = 600;
const MAX_INCREMENT_SECONDS: u64 = 300;

fn time_control_ms(minutes: Option<u64>, increment_seconds: Option<u64>) -> (u64, u64) {
    let minutes = minutes.unwrap_or(10).clamp(1, MAX_START_MINUTES);
    let increment = increment_seconds.unwrap_or(0).min(MAX_INCREMENT_SECONDS);
    (minutes * 60_000, increment * 1_000)
}

impl MatchSocket {
    pub fn handle_new_game(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let kind = match msg.session_kind.as_deref() {
            None => SessionKind::Bot,
            Some(s) => match SessionKind::from_wire(s) {
                Some(kind) => kind,
                None => {
                    self.send_error(ctx, &format!("Unknown session kind: {}", s));
                    return;
                }
            },
        };
        let player_color = match msg.color_preference.as_deref() {
            Some("black") => Color::Black,
            _ => Color::White,
        };
        let (start_time_ms, increment_ms) =
            time_control_ms(msg.start_time_minutes, msg.increment_seconds);
        let config = MatchConfig {
            kind,
            player_color,
            start_time_ms,
            increment_ms,
        };
        let now = Instant::now();

        // A new game invalidates whatever search was still in flight.
        self.broker.supersede();

        let mut restored = false;
        let controller = if msg.resume_saved.unwrap_or(false) {
            match persistence::restore(self.app_state.storage.as_ref(), kind)
                .and_then(|saved| MatchController::restore(&saved, &config, now))
            {
                Some(controller) => {
                    restored = true;
                    controller
                }
                None => MatchController::new(&config, now),
            }
        } else {
            MatchController::new(&config, now)
        };
        info!(
            "socket {}: started {} session {} ({})",
            self.id,
            kind.wire(),
            controller.session.id,
            if restored { "restored" } else { "fresh" }
        );
        self.controller = Some(controller);
        if !restored {
            // A fresh game supersedes any stale snapshot.
            self.discard_saved();
        }

        let mut out = self.base_state(if restored {
            "session_restored"
        } else {
            "game_started"
        });
        out.color = Some(color_to_string(player_color));
        if restored {
            out.move_history = self
                .controller
                .as_ref()
                .map(|c| c.session.history.clone());
        }
        self.send_message(ctx, out);

        if self
            .controller
            .as_ref()
            .map_or(false, |c| c.engine_to_move())
        {
            self.request_engine_move(ctx);
        }
    }

    pub fn handle_move(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        if self.controller.is_none() {
            self.send_error(ctx, "No active session");
            return;
        }
        let (Some(from), Some(to)) = (
            msg.move_from.as_deref().and_then(parse_square),
            msg.move_to.as_deref().and_then(parse_square),
        ) else {
            self.send_error(ctx, "Move requires valid from and to squares");
            return;
        };
        let promotion = msg.promote_to.as_deref().and_then(promotion_from_wire);

        let result = {
            let controller = self.controller.as_mut().unwrap();
            // In a bot session the client only ever speaks for the
            // player's color; in a local human session it drives both.
            let mover = match controller.session.kind {
                SessionKind::Bot => controller.session.player_color,
                SessionKind::Human => controller.session.turn_color(),
            };
            controller.submit_move(mover, from, to, promotion, Instant::now())
        };

        match result {
            Ok(committed) => self.after_commit(committed, ctx),
            Err(rejection) => {
                debug!("socket {}: move rejected ({})", self.id, rejection.tag());
                let mut out = self.base_state("rejected");
                out.error = Some(rejection.tag().to_string());
                self.send_message(ctx, out);
            }
        }
    }

    pub fn handle_get_moves(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(controller) = &self.controller else {
            self.send_error(ctx, "No active session");
            return;
        };
        let Some(square) = msg.square.as_deref().and_then(parse_square) else {
            self.send_error(ctx, "Get moves requires a valid square");
            return;
        };
        let moves = controller
            .session
            .position
            .legal_destinations(square)
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut out = self.base_state("available_moves");
        out.available_moves = Some(moves);
        self.send_message(ctx, out);
    }

    /// Explicit client request for an engine move — the recovery path
    /// after an `engine_timeout`.
    pub fn handle_engine_move(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let due = self
            .controller
            .as_ref()
            .map_or(false, |c| c.engine_to_move() && !c.animation.is_locked());
        if !due {
            self.send_error(ctx, "It is not the engine's turn");
            return;
        }
        self.request_engine_move(ctx);
    }

    pub fn handle_pause(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let expired = {
            let Some(controller) = &mut self.controller else {
                self.send_error(ctx, "No active session");
                return;
            };
            controller.pause(Instant::now())
        };
        if expired.is_some() {
            self.discard_saved();
            let msg = self.base_state("game_over");
            self.send_message(ctx, msg);
            return;
        }
        let msg = self.base_state("paused");
        self.send_message(ctx, msg);
    }

    pub fn handle_resume(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(controller) = &mut self.controller else {
            self.send_error(ctx, "No active session");
            return;
        };
        controller.resume(Instant::now());
        let msg = self.base_state("resumed");
        self.send_message(ctx, msg);
    }

    pub fn handle_resign(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let status = {
            let Some(controller) = &mut self.controller else {
                self.send_error(ctx, "No active session");
                return;
            };
            let resigner = match controller.session.kind {
                SessionKind::Bot => controller.session.player_color,
                SessionKind::Human => controller.session.turn_color(),
            };
            controller.resign(resigner, Instant::now())
        };
        info!("socket {}: resignation ({})", self.id, status.wire());
        self.broker.supersede();
        self.discard_saved();
        let msg = self.base_state("game_over");
        self.send_message(ctx, msg);
    }

    pub fn handle_time_sync(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if self.controller.is_none() {
            self.send_error(ctx, "No active session");
            return;
        }
        let msg = self.base_state("clock_update");
        self.send_message(ctx, msg);
    }

    /// Issue one engine request for the current position. At most one
    /// is live; replies are matched back by request id.
    pub fn request_engine_move(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let command = {
            let Some(controller) = &self.controller else {
                return;
            };
            if !controller.engine_to_move() {
                return;
            }
            go_command(&controller.session.position.fen(), DEFAULT_SEARCH_DEPTH)
        };
        let request_id = self.broker.issue();
        info!("socket {}: engine request {} issued", self.id, request_id);

        let msg = self.base_state("engine_thinking");
        self.send_message(ctx, msg);

        let pending = self.app_state.engine.send(EngineCommand(command));
        let bounded = async move {
            match actix_rt::time::timeout(ENGINE_BUDGET, pending).await {
                Ok(Ok(line)) => Some(line),
                // Mailbox failure and budget expiry both mean "no move".
                Ok(Err(_)) | Err(_) => None,
            }
        };
        ctx.spawn(bounded.into_actor(self).map(move |line, act, ctx| {
            act.on_engine_reply(request_id, line, ctx);
        }));
    }

    /// Every reply lands here, tagged with the request it answers.
    /// Replies for superseded requests are dropped before anything
    /// else is looked at.
    pub fn on_engine_reply(
        &mut self,
        request_id: u64,
        line: Option<String>,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        if !self.broker.accepts(request_id) {
            debug!(
                "socket {}: dropping stale engine reply for request {}",
                self.id, request_id
            );
            return;
        }

        let Some(mv) = line.as_deref().and_then(parse_bestmove) else {
            self.broker.complete(request_id);
            warn!(
                "socket {}: engine request {} produced no move within budget",
                self.id, request_id
            );
            let msg = self.base_state("engine_timeout");
            self.send_message(ctx, msg);
            return;
        };
        self.apply_engine_move(request_id, mv, 0, ctx);
    }

    /// Commit an engine move through the same pipeline as a human one.
    /// If its own commit window is still closing the attempt is retried
    /// after one animation window; the watchdog bounds how long that
    /// can possibly go on. The request stays live across retries so a
    /// `new_game` in between supersedes it and the deferred move is
    /// dropped at the gate, never submitted to the new session.
    fn apply_engine_move(
        &mut self,
        request_id: u64,
        mv: ChessMove,
        attempts: u8,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        if !self.broker.accepts(request_id) {
            debug!(
                "socket {}: dropping engine move {} for superseded request {}",
                self.id, mv, request_id
            );
            return;
        }
        let result = {
            let Some(controller) = &mut self.controller else {
                self.broker.complete(request_id);
                return;
            };
            let mover = !controller.session.player_color;
            controller.submit_move(
                mover,
                mv.get_source(),
                mv.get_dest(),
                mv.get_promotion(),
                Instant::now(),
            )
        };
        match result {
            Ok(committed) => {
                self.broker.complete(request_id);
                self.after_commit(committed, ctx);
            }
            Err(Rejection::Busy) if attempts < 3 => {
                ctx.run_later(ANIMATION_WINDOW, move |act, ctx| {
                    act.apply_engine_move(request_id, mv, attempts + 1, ctx)
                });
            }
            Err(rejection) => {
                self.broker.complete(request_id);
                warn!(
                    "socket {}: engine move {} rejected ({})",
                    self.id,
                    mv,
                    rejection.tag()
                );
                let msg = self.base_state("engine_timeout");
                self.send_message(ctx, msg);
            }
        }
    }

    /// Whether a deferred callback still belongs to the session on
    /// this socket. Closures scheduled with `run_later` can outlive
    /// the game they were scheduled for.
    pub fn is_current_session(&self, session_id: &str) -> bool {
        self.controller
            .as_ref()
            .map_or(false, |c| c.session.id == session_id)
    }

    /// Shared tail of every committed move, human or engine: persist,
    /// schedule the animation unlock, notify the client.
    pub fn after_commit(&mut self, committed: Committed, ctx: &mut ws::WebsocketContext<Self>) {
        if committed.status.is_terminal() {
            self.discard_saved();
        } else {
            self.snapshot_session();
        }

        if let Some(controller) = &self.controller {
            let session_id = controller.session.id.clone();
            ctx.run_later(ANIMATION_WINDOW, move |act, ctx| {
                act.on_animation_complete(&session_id, ctx)
            });
        }

        let mut out = self.base_state("move_committed");
        out.last_move = Some(committed.record);
        self.send_message(ctx, out);

        if committed.status.is_terminal() {
            let msg = self.base_state("game_over");
            self.send_message(ctx, msg);
        }
    }

    /// The transition window elapsed: release the lock and, if it is
    /// now the engine's turn, set it thinking. A callback scheduled by
    /// a session that has since been replaced must not unlock the new
    /// one; the watchdog is the only force-unlock path.
    pub fn on_animation_complete(&mut self, session_id: &str, ctx: &mut ws::WebsocketContext<Self>) {
        if !self.is_current_session(session_id) {
            return;
        }
        let engine_due = {
            let Some(controller) = &mut self.controller else {
                return;
            };
            controller.animation.unlock();
            controller.engine_to_move()
        };
        if engine_due && self.broker.is_idle() {
            self.request_engine_move(ctx);
        }
    }

    pub fn snapshot_session(&self) {
        if let Some(controller) = &self.controller {
            persistence::snapshot(self.app_state.storage.as_ref(), &controller.session);
        }
    }

    pub fn discard_saved(&self) {
        if let Some(controller) = &self.controller {
            persistence::discard(self.app_state.storage.as_ref(), controller.session.kind);
        }
    }
}
