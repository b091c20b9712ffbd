use chess::{Board, Color, Piece, Square};
use std::str::FromStr;

/// Convert a chess color to its wire representation.
pub fn color_to_string(color: Color) -> String {
    match color {
        Color::White => "white".to_string(),
        Color::Black => "black".to_string(),
    }
}

/// Parse a wire color back into a chess color.
pub fn color_from_str(s: &str) -> Option<Color> {
    match s {
        "white" => Some(Color::White),
        "black" => Some(Color::Black),
        _ => None,
    }
}

/// Uppercase algebraic letter for a piece.
pub fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

/// Parse an uppercase algebraic letter back into a piece.
pub fn piece_from_letter(s: &str) -> Option<Piece> {
    match s {
        "P" => Some(Piece::Pawn),
        "N" => Some(Piece::Knight),
        "B" => Some(Piece::Bishop),
        "R" => Some(Piece::Rook),
        "Q" => Some(Piece::Queen),
        "K" => Some(Piece::King),
        _ => None,
    }
}

/// Promotion piece from the client's wire value.
pub fn promotion_from_wire(s: &str) -> Option<Piece> {
    match s {
        "q" | "queen" => Some(Piece::Queen),
        "r" | "rook" => Some(Piece::Rook),
        "b" | "bishop" => Some(Piece::Bishop),
        "n" | "knight" => Some(Piece::Knight),
        _ => None,
    }
}

/// Parse a client square string ("e2") into a `Square`.
pub fn parse_square(s: &str) -> Option<Square> {
    Square::from_str(&s.to_lowercase()).ok()
}

pub fn file_char(square: Square) -> char {
    (b'a' + square.get_file().to_index() as u8) as char
}

pub fn rank_char(square: Square) -> char {
    (b'1' + square.get_rank().to_index() as u8) as char
}

/// Check if the board has insufficient material for checkmate.
///
/// Covers K vs K, K+minor vs K, and KB vs KB with both bishops on the
/// same square color. Any pawn, rook or queen means mate is still
/// possible.
pub fn has_insufficient_material(board: &Board) -> bool {
    let heavy =
        *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if heavy.popcnt() > 0 {
        return false;
    }

    let knights = *board.pieces(Piece::Knight);
    let bishops = *board.pieces(Piece::Bishop);
    match knights.popcnt() + bishops.popcnt() {
        0 | 1 => true,
        2 => {
            if knights.popcnt() == 0 {
                let white_bishops = bishops & *board.color_combined(Color::White);
                let black_bishops = bishops & *board.color_combined(Color::Black);
                if white_bishops.popcnt() == 1 && black_bishops.popcnt() == 1 {
                    return is_light_square(white_bishops.to_square())
                        == is_light_square(black_bishops.to_square());
                }
            }
            false
        }
        _ => false,
    }
}

fn is_light_square(square: Square) -> bool {
    (square.get_rank().to_index() + square.get_file().to_index()) % 2 == 1
}
