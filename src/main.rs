use actix::{Actor, Arbiter};
use actix_web::{web, App, HttpServer};
use log::info;
use std::sync::Arc;

mod engine;
mod game;
mod models;
mod routes;
mod websocket;

use engine::worker::EngineWorker;
use game::persistence::{FileStorage, Storage};
use models::app_state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let data_dir =
        std::env::var("CHESS_LOBBY_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&data_dir)?);

    // The engine lives on its own arbiter so searches never block the
    // session sockets.
    let engine_arbiter = Arbiter::new();
    let engine =
        EngineWorker::start_in_arbiter(&engine_arbiter.handle(), |_| EngineWorker::default());

    info!("starting chess lobby server at http://127.0.0.1:8080");

    let app_state = web::Data::new(AppState { storage, engine });

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure_routes)
    })
    .bind("127.0.0.1:8080")?
    .run()
    .await
}
