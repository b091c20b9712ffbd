use chess::{Board, BoardStatus, ChessMove, MoveGen, Piece};

/// Depth cap for the worker. Enough to not embarrass itself in a
/// casual lobby while staying well inside the response budget.
pub const MAX_DEPTH: u32 = 4;

const MATE: i32 = 100_000;
const INF: i32 = 1_000_000;

fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 100,
        Piece::Knight => 320,
        Piece::Bishop => 330,
        Piece::Rook => 500,
        Piece::Queen => 900,
        Piece::King => 0,
    }
}

/// Material balance from the side to move's point of view.
fn evaluate(board: &Board) -> i32 {
    let us = board.side_to_move();
    let mut score = 0;
    for square in *board.combined() {
        if let (Some(piece), Some(color)) = (board.piece_on(square), board.color_on(square)) {
            if color == us {
                score += piece_value(piece);
            } else {
                score -= piece_value(piece);
            }
        }
    }
    score
}

fn negamax(board: &Board, depth: u32, mut alpha: i32, beta: i32, ply: u32) -> i32 {
    match board.status() {
        // Prefer the shortest mate.
        BoardStatus::Checkmate => return -MATE + ply as i32,
        BoardStatus::Stalemate => return 0,
        BoardStatus::Ongoing => {}
    }
    if depth == 0 {
        return evaluate(board);
    }

    let mut best = -INF;
    for mv in MoveGen::new_legal(board) {
        let next = board.make_move_new(mv);
        let score = -negamax(&next, depth - 1, -beta, -alpha, ply + 1);
        if score > best {
            best = score;
        }
        if best > alpha {
            alpha = best;
        }
        if alpha >= beta {
            break;
        }
    }
    best
}

/// Best move for the side to move, or `None` when there is none
/// (terminal position). Deterministic: ties keep the first move found.
pub fn best_move(board: &Board, depth: u32) -> Option<ChessMove> {
    let depth = depth.clamp(1, MAX_DEPTH);
    let mut best: Option<(ChessMove, i32)> = None;
    for mv in MoveGen::new_legal(board) {
        let next = board.make_move_new(mv);
        let score = -negamax(&next, depth - 1, -INF, INF, 1);
        if best.as_ref().map_or(true, |(_, s)| score > *s) {
            best = Some((mv, score));
        }
    }
    best.map(|(mv, _)| mv)
}
