use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{info, warn};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::engine::broker::EngineBroker;
use crate::game::pipeline::MatchController;
use crate::game::utils::color_to_string;
use crate::models::app_state::AppState;
use crate::models::messages::{ClientMessage, ServerMessage};

/// Clock tick cadence. The clock itself charges wall-time deltas, so
/// a delayed tick cannot desync it.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// One WebSocket connection, one match session. The actor is the
/// single owner of the controller and the broker; every mutation of
/// the session happens inside this actor's context, which is the
/// mutual-exclusion boundary between human input, clock ticks and
/// engine replies.
pub struct MatchSocket {
    pub id: String,
    pub app_state: web::Data<AppState>,
    pub controller: Option<MatchController>,
    pub broker: EngineBroker,
}

impl MatchSocket {
    pub fn new(app_state: web::Data<AppState>) -> Self {
        MatchSocket {
            id: Uuid::new_v4().to_string(),
            app_state,
            controller: None,
            broker: EngineBroker::new(),
        }
    }

    pub fn send_message(&self, ctx: &mut ws::WebsocketContext<Self>, msg: ServerMessage) {
        match serde_json::to_string(&msg) {
            Ok(text) => ctx.text(text),
            Err(e) => {
                warn!("failed to serialize server message: {}", e);
                ctx.text(r#"{"message_type":"error","error":"internal server error"}"#);
            }
        }
    }

    pub fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, error: &str) {
        let mut msg = ServerMessage::new("error");
        msg.error = Some(error.to_string());
        self.send_message(ctx, msg);
    }

    /// A server message pre-filled with the observable session state.
    pub fn base_state(&self, message_type: &str) -> ServerMessage {
        let mut msg = ServerMessage::new(message_type);
        if let Some(controller) = &self.controller {
            msg.session_id = Some(controller.session.id.clone());
            msg.fen = Some(controller.session.position.fen());
            msg.game_status = Some(controller.session.status.wire());
            msg.white_time_ms = Some(controller.clock.remaining(chess::Color::White));
            msg.black_time_ms = Some(controller.clock.remaining(chess::Color::Black));
            msg.increment_ms = Some(controller.clock.increment_ms);
            msg.active_color = Some(color_to_string(controller.session.turn_color()));
            msg.animating = Some(controller.animation.is_locked());
        }
        msg
    }

    fn dispatch(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg.message_type.as_str() {
            "new_game" => self.handle_new_game(msg, ctx),
            "move" => self.handle_move(msg, ctx),
            "get_moves" => self.handle_get_moves(msg, ctx),
            "engine_move" => self.handle_engine_move(ctx),
            "pause" => self.handle_pause(ctx),
            "resume" => self.handle_resume(ctx),
            "resign" => self.handle_resign(ctx),
            "time_sync" => self.handle_time_sync(ctx),
            other => {
                info!("unknown message type: {}", other);
                self.send_error(ctx, &format!("Unknown message type: {}", other));
            }
        }
    }
}

impl Actor for MatchSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("session socket connected: {}", self.id);
        ctx.run_interval(TICK_INTERVAL, |act, ctx| act.on_tick(ctx));
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        // An in-flight engine reply must never land after teardown.
        self.broker.supersede();
        info!("session socket closed: {}", self.id);
        Running::Stop
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for MatchSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => self.dispatch(client_msg, ctx),
                    Err(e) => {
                        warn!("error parsing client message: {}", e);
                        self.send_error(ctx, &format!("Invalid message format: {}", e));
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                warn!("binary messages are not supported");
                self.send_error(ctx, "Binary messages are not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                info!("connection closed: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            _ => {
                ctx.stop();
            }
        }
    }
}

impl MatchSocket {
    /// Recurring housekeeping: animation watchdog, clock expiry,
    /// periodic clock push.
    fn on_tick(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let now = Instant::now();
        let (expired, watchdog_fired, engine_due) = {
            let Some(controller) = &mut self.controller else {
                return;
            };
            let watchdog_fired = controller.animation.force_unlock_if_stuck(now);
            let expired = controller.tick(now);
            let engine_due = controller.engine_to_move() && !controller.animation.is_locked();
            (expired, watchdog_fired, engine_due)
        };

        if let Some(status) = expired {
            info!("session {}: clock expired ({})", self.id, status.wire());
            self.broker.supersede();
            self.discard_saved();
            let msg = self.base_state("game_over");
            self.send_message(ctx, msg);
            return;
        }

        // The watchdog may have been the only thing holding back the
        // engine's turn.
        if watchdog_fired && engine_due && self.broker.is_idle() {
            self.request_engine_move(ctx);
        }

        let running = self
            .controller
            .as_ref()
            .map_or(false, |c| !c.session.status.is_terminal());
        if running {
            let msg = self.base_state("clock_update");
            self.send_message(ctx, msg);
        }
    }
}

/// WebSocket connection handler.
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let socket = MatchSocket::new(app_state);
    info!("new WebSocket connection: {}", socket.id);
    ws::start(socket, &req, stream)
}
