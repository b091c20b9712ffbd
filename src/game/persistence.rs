use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::models::session::{HistoryMove, MatchSession, SessionKind};

/// Key-value string storage, the only durable dependency of the
/// controller.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// One file per key under a data directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileStorage { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = fs::write(self.path_for(key), value) {
            warn!("failed to write {}: {}", key, e);
        }
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }
}

/// In-memory storage, used by tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

/// What survives a reload: the position token and the move list for
/// display. Clocks and the animation lock are deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    pub fen: String,
    pub moves: Vec<HistoryMove>,
}

/// Only solo (vs-engine) sessions persist across reloads.
fn session_key(kind: SessionKind) -> Option<&'static str> {
    match kind {
        SessionKind::Bot => Some("session_bot"),
        SessionKind::Human => None,
    }
}

/// Fire-and-forget snapshot of an in-progress session.
pub fn snapshot(storage: &dyn Storage, session: &MatchSession) {
    let Some(key) = session_key(session.kind) else {
        return;
    };
    let saved = SavedSession {
        fen: session.position.fen(),
        moves: session.history.clone(),
    };
    match serde_json::to_string(&saved) {
        Ok(payload) => storage.set(key, &payload),
        Err(e) => warn!("failed to serialize session snapshot: {}", e),
    }
}

/// Load a saved session of the given kind. Corrupt or unparseable
/// data fails soft: it is treated as "no saved session".
pub fn restore(storage: &dyn Storage, kind: SessionKind) -> Option<SavedSession> {
    let key = session_key(kind)?;
    let payload = storage.get(key)?;
    match serde_json::from_str::<SavedSession>(&payload) {
        Ok(saved) => {
            info!("restored saved {} session ({} moves)", kind.wire(), saved.moves.len());
            Some(saved)
        }
        Err(e) => {
            warn!("discarding corrupt saved session: {}", e);
            None
        }
    }
}

/// Drop the saved session for this kind, if any.
pub fn discard(storage: &dyn Storage, kind: SessionKind) {
    if let Some(key) = session_key(kind) {
        storage.remove(key);
    }
}
