//! daybook web server: REST API for shared daily journals.
//!
//! Per-date notes of ordered text blocks, todos and images, a friend
//! graph, and per-note share grants, all persisted in SQLite.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod utils;

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;

use crate::storage::{db_path, Storage};

use config::{Cli, Config};
use state::{AppState, SharedState};

/// Entry point: parse CLI, open storage, start server.
pub async fn run() {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli);

    crate::logging::init();

    crate::dlog!("daybook starting");
    crate::dlog!("  data directory: {}", config.data_dir.display());

    std::fs::create_dir_all(&config.data_dir).expect("failed to create data directory");
    let database = db_path(&config.data_dir);
    let storage = Storage::open(&database).expect("failed to open database");

    crate::dlog!("  database: {}", database.display());
    crate::dlog!("  images: {}", storage.images_dir.display());

    let state: SharedState = Arc::new(tokio::sync::Mutex::new(AppState {
        storage,
        sessions: HashMap::new(),
    }));

    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    crate::dlog!("daybook listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.expect("server error");
}
