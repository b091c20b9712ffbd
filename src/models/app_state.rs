use actix::Addr;
use std::sync::Arc;

use crate::engine::worker::EngineWorker;
use crate::game::persistence::Storage;

/// Application state shared between connections.
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub engine: Addr<EngineWorker>,
}
