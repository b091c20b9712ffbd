use chess::{Color, Piece};
use serde::{Deserialize, Serialize};

use crate::game::position::{AppliedMove, PositionStore};
use crate::game::utils::{color_to_string, piece_letter};

/// What kind of opponent this session was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Both colors are driven locally by the same client.
    Human,
    /// The player faces the engine worker.
    Bot,
}

impl SessionKind {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "human" => Some(SessionKind::Human),
            "bot" => Some(SessionKind::Bot),
            _ => None,
        }
    }

    pub fn wire(&self) -> &'static str {
        match self {
            SessionKind::Human => "human",
            SessionKind::Bot => "bot",
        }
    }
}

/// Unified game status used everywhere in the controller.
///
/// Terminal variants carry the winner where one exists. Timeout and
/// resignation are controller-level transitions; the rules engine is
/// never asked to "force end" a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    Check,
    Checkmate { winner: Color },
    Stalemate,
    DrawRepetition,
    DrawMaterial,
    Timeout { winner: Color },
    Resigned { winner: Color },
}

impl GameStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameStatus::Ongoing | GameStatus::Check)
    }

    /// Wire representation sent to the client.
    pub fn wire(&self) -> String {
        match self {
            GameStatus::Ongoing => "in_progress".to_string(),
            GameStatus::Check => "check".to_string(),
            GameStatus::Checkmate { winner } => {
                format!("checkmate_{}_wins", color_to_string(*winner))
            }
            GameStatus::Stalemate => "stalemate".to_string(),
            GameStatus::DrawRepetition => "draw_repetition".to_string(),
            GameStatus::DrawMaterial => "draw_insufficient_material".to_string(),
            GameStatus::Timeout { winner } => {
                format!("timeout_{}_wins", color_to_string(*winner))
            }
            GameStatus::Resigned { winner } => {
                format!("resigned_{}_wins", color_to_string(*winner))
            }
        }
    }
}

/// A committed move as it appears in the history log and on the wire.
///
/// Immutable once appended; stores wire-friendly strings so the same
/// record serves the move list UI and the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMove {
    pub from: String,
    pub to: String,
    pub san: String,
    pub piece: String,
    pub color: String,
    pub captured: Option<String>,
    pub promotion: Option<String>,
}

impl HistoryMove {
    pub fn from_applied(applied: &AppliedMove) -> Self {
        HistoryMove {
            from: applied.mv.get_source().to_string(),
            to: applied.mv.get_dest().to_string(),
            san: applied.san.clone(),
            piece: piece_letter(applied.piece).to_string(),
            color: color_to_string(applied.color),
            captured: applied.captured.map(|p| piece_letter(p).to_string()),
            promotion: applied.mv.get_promotion().map(|p| piece_letter(p).to_string()),
        }
    }
}

/// Captured-piece tallies, keyed by the color that took them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedPieces {
    pub by_white: Vec<Piece>,
    pub by_black: Vec<Piece>,
}

impl CapturedPieces {
    pub fn push(&mut self, taker: Color, piece: Piece) {
        match taker {
            Color::White => self.by_white.push(piece),
            Color::Black => self.by_black.push(piece),
        }
    }
}

/// The aggregate root for one match. Mutated only through the move
/// execution pipeline.
#[derive(Debug, Clone)]
pub struct MatchSession {
    pub id: String,
    pub kind: SessionKind,
    pub player_color: Color,
    pub position: PositionStore,
    pub history: Vec<HistoryMove>,
    pub captured: CapturedPieces,
    pub status: GameStatus,
}

impl MatchSession {
    pub fn turn_color(&self) -> Color {
        self.position.side_to_move()
    }
}
