//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::web::state::SharedState;

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.lock().await;
    let sessions = state.sessions.len();

    let body = serde_json::json!({
        "status": "ok",
        "active_sessions": sessions,
    });
    (StatusCode::OK, axum::Json(body))
}
