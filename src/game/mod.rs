pub mod animation;
pub mod clock;
pub mod persistence;
pub mod pipeline;
pub mod position;
pub mod utils;

use thiserror::Error;

/// Why a submitted move was turned away. All variants are recoverable:
/// the caller re-prompts or re-issues, nothing is thrown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("illegal move")]
    IllegalMove,
    #[error("not your turn")]
    NotYourTurn,
    #[error("game is already over")]
    GameOver,
    #[error("previous move is still animating")]
    Busy,
}

impl Rejection {
    /// Stable tag used on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            Rejection::IllegalMove => "illegal-move",
            Rejection::NotYourTurn => "not-your-turn",
            Rejection::GameOver => "game-over",
            Rejection::Busy => "busy",
        }
    }
}
