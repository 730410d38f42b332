//! Per-date note handlers.
//!
//! Notes are addressed by calendar date for the owner's own journal and
//! created lazily: reading a date with no note returns an empty list
//! entry-free, and the first meta save or block insert creates the row.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::storage::now_secs;
use crate::visibility::visible_notes;
use crate::web::auth::require_user;
use crate::web::state::SharedState;
use crate::web::utils::{api_error, is_date, note_to_json, storage_error_response, visible_note_to_json};

#[derive(Deserialize)]
pub struct UpdateNotePayload {
    title: Option<String>,
    subtitle: Option<String>,
    content: Option<String>,
}

/// All notes the current user may see for one date: their own plus any
/// shared with them by current friends, each with its merged blocks.
pub async fn get_notes_for_date_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(date): Path<String>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if !is_date(&date) {
        return api_error(StatusCode::BAD_REQUEST, "date must be YYYY-MM-DD");
    }

    let st = state.lock().await;
    let visible = match visible_notes(&st.storage, &user_id, &date) {
        Ok(visible) => visible,
        Err(e) => return storage_error_response(e),
    };
    let mut notes = Vec::with_capacity(visible.len());
    for v in &visible {
        match visible_note_to_json(&st.storage, v) {
            Ok(value) => notes.push(value),
            Err(e) => return storage_error_response(e),
        }
    }
    axum::Json(serde_json::json!({ "date": date, "notes": notes })).into_response()
}

/// Save title/subtitle/content of the caller's own note for a date,
/// creating the note if this is the first write.
pub async fn update_note_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(date): Path<String>,
    axum::Json(req): axum::Json<UpdateNotePayload>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if !is_date(&date) {
        return api_error(StatusCode::BAD_REQUEST, "date must be YYYY-MM-DD");
    }

    let now = now_secs();
    let st = state.lock().await;
    let note = match st.storage.ensure_note(&user_id, &date, now) {
        Ok(note) => note,
        Err(e) => return storage_error_response(e),
    };
    if let Err(e) = st.storage.update_note_meta(
        &note.id,
        req.title.as_deref(),
        req.subtitle.as_deref(),
        req.content.as_deref(),
        now,
    ) {
        return storage_error_response(e);
    }

    let note = match st.storage.get_note(&note.id) {
        Ok(Some(note)) => note,
        Ok(None) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, "note vanished"),
        Err(e) => return storage_error_response(e),
    };
    match note_to_json(&st.storage, &note) {
        Ok(value) => axum::Json(value).into_response(),
        Err(e) => storage_error_response(e),
    }
}

/// Distinct dates with notes visible to the caller, newest first. Drives
/// the calendar view.
pub async fn list_dates_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    match st.storage.list_visible_dates(&user_id) {
        Ok(dates) => axum::Json(serde_json::json!({ "dates": dates })).into_response(),
        Err(e) => storage_error_response(e),
    }
}
