use chess::ChessMove;
use log::{debug, info};
use std::str::FromStr;
use std::time::Duration;

/// How long the broker waits for the worker before resolving a request
/// as timed out.
pub const ENGINE_BUDGET: Duration = Duration::from_secs(10);

/// Default search depth requested from the worker, in plies.
pub const DEFAULT_SEARCH_DEPTH: u32 = 3;

/// Bookkeeping for the one request that is allowed to be in flight.
///
/// Every reply carries the id of the request it answers; a reply whose
/// id is not the live one is refused, which is how a slow search
/// against a position that no longer exists is kept from ever reaching
/// the session. The worker itself cannot be cancelled — superseding is
/// the only (advisory) cancellation there is.
#[derive(Debug, Default)]
pub struct EngineBroker {
    next_id: u64,
    live: Option<u64>,
}

impl EngineBroker {
    pub fn new() -> Self {
        EngineBroker::default()
    }

    /// Issue a fresh request, superseding any still-live one.
    pub fn issue(&mut self) -> u64 {
        if let Some(previous) = self.live.take() {
            info!("superseding engine request {}", previous);
        }
        self.next_id += 1;
        self.live = Some(self.next_id);
        self.next_id
    }

    /// Whether a reply tagged with this id may still resolve.
    pub fn accepts(&self, id: u64) -> bool {
        self.live == Some(id)
    }

    /// Mark the live request as resolved. Returns false for stale ids.
    pub fn complete(&mut self, id: u64) -> bool {
        if self.accepts(id) {
            self.live = None;
            true
        } else {
            debug!("ignoring completion of stale engine request {}", id);
            false
        }
    }

    pub fn is_idle(&self) -> bool {
        self.live.is_none()
    }

    /// Teardown: whatever is in flight must never resolve.
    pub fn supersede(&mut self) {
        if let Some(live) = self.live.take() {
            info!("abandoning engine request {}", live);
        }
    }
}

/// The command line sent to the worker for one search.
pub fn go_command(fen: &str, depth: u32) -> String {
    format!("go depth {} fen {}", depth, fen)
}

/// Parse the worker's terminal token. Anything that is not a
/// well-formed move — the `(none)` sentinel, garbage, an empty line —
/// is "no move"; the caller treats that the same as a timeout.
pub fn parse_bestmove(line: &str) -> Option<ChessMove> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "bestmove" {
        return None;
    }
    let token = parts.next()?;
    if token == "(none)" {
        return None;
    }
    ChessMove::from_str(token).ok()
}
