use chess::{Board, BoardStatus, ChessMove, Color, Game, MoveGen, Piece, Square};
use std::str::FromStr;

use crate::game::utils::{file_char, has_insufficient_material, piece_letter, rank_char};
use crate::game::Rejection;
use crate::models::session::GameStatus;

/// A legal move that has just been applied, with its derived fields.
#[derive(Debug, Clone)]
pub struct AppliedMove {
    pub mv: ChessMove,
    pub san: String,
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub color: Color,
}

/// Single source of truth for the board position. Wraps the rules
/// engine; legality and terminal detection are delegated, never
/// reimplemented here.
#[derive(Debug, Clone)]
pub struct PositionStore {
    game: Game,
}

impl PositionStore {
    pub fn new() -> Self {
        PositionStore { game: Game::new() }
    }

    pub fn from_fen(fen: &str) -> Option<Self> {
        let board = Board::from_str(fen).ok()?;
        Some(PositionStore {
            game: Game::new_with_board(board),
        })
    }

    pub fn fen(&self) -> String {
        self.game.current_position().to_string()
    }

    pub fn side_to_move(&self) -> Color {
        self.game.side_to_move()
    }

    pub fn board(&self) -> Board {
        self.game.current_position()
    }

    /// Validate and apply a candidate move. Rejection leaves the
    /// position untouched.
    pub fn try_apply(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    ) -> Result<AppliedMove, Rejection> {
        let board = self.game.current_position();
        let mv = ChessMove::new(from, to, promotion);
        if !MoveGen::new_legal(&board).any(|m| m == mv) {
            return Err(Rejection::IllegalMove);
        }
        let piece = match board.piece_on(from) {
            Some(p) => p,
            None => return Err(Rejection::IllegalMove),
        };
        let color = board.side_to_move();
        // A pawn changing file onto an empty square is an en passant
        // capture; the victim is not on the destination square.
        let captured = board.piece_on(to).or_else(|| {
            (piece == Piece::Pawn && from.get_file() != to.get_file()).then_some(Piece::Pawn)
        });

        let mut san = san_base(&board, mv, piece, captured.is_some());
        if !self.game.make_move(mv) {
            return Err(Rejection::IllegalMove);
        }

        let after = self.game.current_position();
        match after.status() {
            BoardStatus::Checkmate => san.push('#'),
            _ if after.checkers().popcnt() > 0 => san.push('+'),
            _ => {}
        }

        Ok(AppliedMove {
            mv,
            san,
            piece,
            captured,
            color,
        })
    }

    /// Map rules-engine predicates into the unified status enum.
    ///
    /// When a terminal position satisfies several predicates, the first
    /// true one wins: checkmate > stalemate > repetition draw >
    /// insufficient material.
    pub fn status(&self) -> GameStatus {
        let board = self.game.current_position();
        match board.status() {
            BoardStatus::Checkmate => {
                return GameStatus::Checkmate {
                    winner: !board.side_to_move(),
                }
            }
            BoardStatus::Stalemate => return GameStatus::Stalemate,
            BoardStatus::Ongoing => {}
        }
        if self.game.can_declare_draw() {
            return GameStatus::DrawRepetition;
        }
        if has_insufficient_material(&board) {
            return GameStatus::DrawMaterial;
        }
        if board.checkers().popcnt() > 0 {
            GameStatus::Check
        } else {
            GameStatus::Ongoing
        }
    }

    /// Legal destination squares for the piece on `square`. Pure.
    pub fn legal_destinations(&self, square: Square) -> Vec<Square> {
        let board = self.game.current_position();
        let mut destinations = Vec::new();
        for mv in MoveGen::new_legal(&board) {
            if mv.get_source() == square && !destinations.contains(&mv.get_dest()) {
                destinations.push(mv.get_dest());
            }
        }
        destinations
    }
}

impl Default for PositionStore {
    fn default() -> Self {
        PositionStore::new()
    }
}

/// SAN text for `mv` on `board`, without the check/mate suffix.
fn san_base(board: &Board, mv: ChessMove, piece: Piece, is_capture: bool) -> String {
    let from = mv.get_source();
    let to = mv.get_dest();

    if piece == Piece::King {
        let delta = to.get_file().to_index() as i32 - from.get_file().to_index() as i32;
        if delta == 2 {
            return "O-O".to_string();
        }
        if delta == -2 {
            return "O-O-O".to_string();
        }
    }

    let mut san = String::new();
    if piece == Piece::Pawn {
        if is_capture {
            san.push(file_char(from));
            san.push('x');
        }
        san.push_str(&to.to_string());
        if let Some(promo) = mv.get_promotion() {
            san.push('=');
            san.push(piece_letter(promo));
        }
        return san;
    }

    san.push(piece_letter(piece));
    // Disambiguate against other same-type pieces that can also reach
    // the destination.
    let mut conflict = false;
    let mut shares_file = false;
    let mut shares_rank = false;
    for other in MoveGen::new_legal(board) {
        if other.get_dest() == to
            && other.get_source() != from
            && board.piece_on(other.get_source()) == Some(piece)
        {
            conflict = true;
            if other.get_source().get_file() == from.get_file() {
                shares_file = true;
            }
            if other.get_source().get_rank() == from.get_rank() {
                shares_rank = true;
            }
        }
    }
    if conflict {
        if !shares_file {
            san.push(file_char(from));
        } else if !shares_rank {
            san.push(rank_char(from));
        } else {
            san.push(file_char(from));
            san.push(rank_char(from));
        }
    }
    if is_capture {
        san.push('x');
    }
    san.push_str(&to.to_string());
    san
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::utils::parse_square;

    fn apply(store: &mut PositionStore, from: &str, to: &str) -> AppliedMove {
        store
            .try_apply(
                parse_square(from).unwrap(),
                parse_square(to).unwrap(),
                None,
            )
            .unwrap()
    }

    #[test]
    fn legal_move_applies_and_flips_turn() {
        let mut store = PositionStore::new();
        let applied = apply(&mut store, "e2", "e4");
        assert_eq!(applied.san, "e4");
        assert_eq!(applied.color, Color::White);
        assert_eq!(store.side_to_move(), Color::Black);
    }

    #[test]
    fn illegal_move_is_rejected_without_mutation() {
        let mut store = PositionStore::new();
        let before = store.fen();
        let err = store
            .try_apply(
                parse_square("e2").unwrap(),
                parse_square("e5").unwrap(),
                None,
            )
            .unwrap_err();
        assert_eq!(err, Rejection::IllegalMove);
        assert_eq!(store.fen(), before);
        assert_eq!(store.side_to_move(), Color::White);
    }

    #[test]
    fn capture_and_en_passant_are_detected() {
        let mut store = PositionStore::new();
        apply(&mut store, "e2", "e4");
        apply(&mut store, "d7", "d5");
        let capture = apply(&mut store, "e4", "d5");
        assert_eq!(capture.san, "exd5");
        assert_eq!(capture.captured, Some(Piece::Pawn));

        // En passant: the victim pawn is not on the destination square.
        let mut store = PositionStore::from_fen(
            "rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3",
        )
        .unwrap();
        let ep = apply(&mut store, "d4", "e3");
        assert_eq!(ep.captured, Some(Piece::Pawn));
        assert_eq!(ep.san, "dxe3");
    }

    #[test]
    fn fools_mate_yields_checkmate_status_and_mate_suffix() {
        let mut store = PositionStore::new();
        apply(&mut store, "f2", "f3");
        apply(&mut store, "e7", "e5");
        apply(&mut store, "g2", "g4");
        let mate = apply(&mut store, "d8", "h4");
        assert_eq!(mate.san, "Qh4#");
        assert_eq!(
            store.status(),
            GameStatus::Checkmate {
                winner: Color::Black
            }
        );
    }

    #[test]
    fn stalemate_is_reported() {
        let store = PositionStore::from_fen("k7/8/1Q6/8/8/8/8/7K b - - 0 1").unwrap();
        assert_eq!(store.status(), GameStatus::Stalemate);
    }

    #[test]
    fn insufficient_material_is_reported() {
        let store = PositionStore::from_fen("8/8/8/8/8/5k2/8/4K3 w - - 0 1").unwrap();
        assert_eq!(store.status(), GameStatus::DrawMaterial);
    }

    #[test]
    fn check_is_reported_as_non_terminal() {
        let mut store = PositionStore::new();
        apply(&mut store, "e2", "e4");
        apply(&mut store, "f7", "f6");
        apply(&mut store, "d1", "h5");
        let status = store.status();
        assert_eq!(status, GameStatus::Check);
        assert!(!status.is_terminal());
    }

    #[test]
    fn legal_destinations_for_a_starting_pawn() {
        let store = PositionStore::new();
        let mut destinations = store.legal_destinations(parse_square("e2").unwrap());
        destinations.sort();
        let mut expected = vec![parse_square("e3").unwrap(), parse_square("e4").unwrap()];
        expected.sort();
        assert_eq!(destinations, expected);
        assert!(store
            .legal_destinations(parse_square("e5").unwrap())
            .is_empty());
    }

    #[test]
    fn san_castling_and_promotion() {
        let mut store = PositionStore::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let castle = apply(&mut store, "e1", "g1");
        assert_eq!(castle.san, "O-O");

        let mut store = PositionStore::from_fen("8/P7/8/8/8/7k/8/4K3 w - - 0 1").unwrap();
        let promo = store
            .try_apply(
                parse_square("a7").unwrap(),
                parse_square("a8").unwrap(),
                Some(Piece::Queen),
            )
            .unwrap();
        assert_eq!(promo.san, "a8=Q");
    }

    #[test]
    fn san_disambiguates_between_twin_knights() {
        let store = PositionStore::from_fen("k7/8/8/8/8/8/1K6/N3N3 w - - 0 1").unwrap();
        let mut store = store;
        let applied = apply(&mut store, "a1", "c2");
        assert_eq!(applied.san, "Nac2");
    }

    #[test]
    fn fen_round_trip() {
        let mut store = PositionStore::new();
        apply(&mut store, "e2", "e4");
        let fen = store.fen();
        let reloaded = PositionStore::from_fen(&fen).unwrap();
        assert_eq!(reloaded.fen(), fen);
        assert_eq!(reloaded.side_to_move(), Color::Black);
        assert!(PositionStore::from_fen("definitely not a fen").is_none());
    }
}
