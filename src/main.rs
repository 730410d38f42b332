//! daybook: shared daily-journaling web service.
//!
//! Serves a JSON REST API for per-date notes composed of ordered text
//! blocks, todos, and images, with a friend graph and per-note share
//! grants. State persists in SQLite.

#[tokio::main]
async fn main() {
    daybook::web::run().await;
}
