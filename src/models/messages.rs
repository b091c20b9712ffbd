use serde::{Deserialize, Serialize};

use crate::models::session::HistoryMove;

/// Message sent from client to server.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientMessage {
    pub message_type: String,
    pub session_kind: Option<String>,
    pub color_preference: Option<String>,
    pub start_time_minutes: Option<u64>,
    pub increment_seconds: Option<u64>,
    pub resume_saved: Option<bool>,
    pub move_from: Option<String>,
    pub move_to: Option<String>,
    pub promote_to: Option<String>,
    pub square: Option<String>,
}

/// Message sent from server to client.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ServerMessage {
    pub message_type: String,
    pub session_id: Option<String>,
    pub fen: Option<String>,
    pub color: Option<String>,
    pub error: Option<String>,
    pub available_moves: Option<Vec<String>>,
    pub last_move: Option<HistoryMove>,
    pub move_history: Option<Vec<HistoryMove>>,
    pub game_status: Option<String>,
    pub white_time_ms: Option<u64>,
    pub black_time_ms: Option<u64>,
    pub increment_ms: Option<u64>,
    pub active_color: Option<String>,
    pub animating: Option<bool>,
}

impl ServerMessage {
    pub fn new(message_type: &str) -> Self {
        ServerMessage {
            message_type: message_type.to_string(),
            ..ServerMessage::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_parses_with_missing_optional_fields() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"message_type":"move","move_from":"e2","move_to":"e4"}"#,
        )
        .unwrap();
        assert_eq!(msg.message_type, "move");
        assert_eq!(msg.move_from.as_deref(), Some("e2"));
        assert_eq!(msg.move_to.as_deref(), Some("e4"));
        assert!(msg.promote_to.is_none());
        assert!(msg.session_kind.is_none());
    }

    #[test]
    fn server_message_serializes_its_type() {
        let msg = ServerMessage::new("game_started");
        let text = serde_json::to_string(&msg).unwrap();
        assert!(text.contains(r#""message_type":"game_started""#));
    }
}
