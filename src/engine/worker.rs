use actix::prelude::*;
use chess::Board;
use log::{info, warn};
use std::str::FromStr;

use crate::engine::search;

/// One search command for the worker, as a text line:
/// `go depth <plies> fen <position>`. The answer is a single terminal
/// best-move token: `bestmove <uci>` or `bestmove (none)`.
#[derive(Message, Debug, Clone)]
#[rtype(result = "String")]
pub struct EngineCommand(pub String);

/// The reasoning engine, hosted on its own arbiter so a search never
/// blocks the session actors. It has no cancellation primitive: once a
/// command is accepted the answer will eventually come, and it is the
/// requester's job to ignore answers it no longer wants.
pub struct EngineWorker {
    depth_cap: u32,
}

impl EngineWorker {
    pub fn new(depth_cap: u32) -> Self {
        EngineWorker { depth_cap }
    }
}

impl Default for EngineWorker {
    fn default() -> Self {
        EngineWorker::new(search::MAX_DEPTH)
    }
}

impl Actor for EngineWorker {
    type Context = Context<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        info!("engine worker started (depth cap {})", self.depth_cap);
    }
}

impl Handler<EngineCommand> for EngineWorker {
    type Result = String;

    fn handle(&mut self, msg: EngineCommand, _: &mut Self::Context) -> Self::Result {
        let Some((depth, fen)) = parse_go(&msg.0) else {
            warn!("malformed engine command: {}", msg.0);
            return "bestmove (none)".to_string();
        };
        let Ok(board) = Board::from_str(fen) else {
            warn!("engine command carried an unusable position: {}", fen);
            return "bestmove (none)".to_string();
        };
        match search::best_move(&board, depth.min(self.depth_cap)) {
            Some(mv) => format!("bestmove {}", mv),
            None => "bestmove (none)".to_string(),
        }
    }
}

/// Parse `go depth <plies> fen <position>`; the FEN runs to the end of
/// the line.
fn parse_go(line: &str) -> Option<(u32, &str)> {
    let rest = line.trim().strip_prefix("go")?.trim_start();
    let rest = rest.strip_prefix("depth")?.trim_start();
    let (depth_str, rest) = rest.split_once(' ')?;
    let depth = depth_str.parse().ok()?;
    let fen = rest.trim_start().strip_prefix("fen")?.trim();
    if fen.is_empty() {
        return None;
    }
    Some((depth, fen))
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn go_command_parses() {
        let command = format!("go depth 3 fen {}", START_FEN);
        let (depth, fen) = parse_go(&command).unwrap();
        assert_eq!(depth, 3);
        assert_eq!(fen, START_FEN);

        assert!(parse_go("go depth fen x").is_none());
        assert!(parse_go("stop").is_none());
        assert!(parse_go("go depth 3 fen").is_none());
    }

    #[actix_rt::test]
    async fn worker_answers_with_a_bestmove_token() {
        let addr = EngineWorker::default().start();
        let reply = addr
            .send(EngineCommand(format!("go depth 2 fen {}", START_FEN)))
            .await
            .unwrap();
        assert!(reply.starts_with("bestmove "));
        assert_ne!(reply, "bestmove (none)");
    }

    #[actix_rt::test]
    async fn malformed_command_answers_none_instead_of_crashing() {
        let addr = EngineWorker::default().start();
        let reply = addr
            .send(EngineCommand("ponder everything".to_string()))
            .await
            .unwrap();
        assert_eq!(reply, "bestmove (none)");

        let reply = addr
            .send(EngineCommand("go depth 2 fen not a position".to_string()))
            .await
            .unwrap();
        assert_eq!(reply, "bestmove (none)");
    }
}
