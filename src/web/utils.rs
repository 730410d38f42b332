//! Shared utility functions for the web server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::compose::{compose, ContentBlock};
use crate::storage::{NoteRow, ProfileRow, Storage, StorageError};
use crate::visibility::VisibleNote;

/// Build a standard JSON error response.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, axum::Json(body)).into_response()
}

/// Map a storage failure to an HTTP response, logging server-side errors.
pub fn storage_error_response(e: StorageError) -> Response {
    match e {
        StorageError::NotFound(msg) => api_error(StatusCode::NOT_FOUND, msg),
        StorageError::AlreadyExists(msg) => api_error(StatusCode::CONFLICT, msg),
        other => {
            crate::dlog!("storage error: {}", other);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Whether a path segment is a real calendar date in `YYYY-MM-DD` form.
/// Used to tell date references apart from note ids in routes that
/// accept either. The length check pins the zero-padded form; chrono
/// would also accept `2026-8-28`.
pub fn is_date(s: &str) -> bool {
    s.len() == 10 && chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Usernames are short ascii handles; anything else breaks search and
/// looks wrong in share lists.
pub fn valid_username(name: &str) -> bool {
    (2..=32).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-')
}

pub fn profile_to_json(p: &ProfileRow) -> serde_json::Value {
    serde_json::json!({
        "id": p.id,
        "username": p.username,
        "full_name": p.full_name,
    })
}

/// Load and merge a note's blocks in display order.
pub fn load_blocks(storage: &Storage, note_id: &str) -> Result<Vec<ContentBlock>, StorageError> {
    Ok(compose(
        storage.list_text_blocks(note_id)?,
        storage.list_todos(note_id)?,
        storage.list_note_images(note_id)?,
    ))
}

/// JSON representation of a note including its merged block sequence.
pub fn note_to_json(storage: &Storage, note: &NoteRow) -> Result<serde_json::Value, StorageError> {
    let blocks: Vec<serde_json::Value> = load_blocks(storage, &note.id)?
        .iter()
        .map(|b| b.to_json())
        .collect();
    Ok(serde_json::json!({
        "id": note.id,
        "owner_id": note.user_id,
        "date": note.date,
        "title": note.title,
        "subtitle": note.subtitle,
        "content": note.content,
        "created_at": note.created_at,
        "updated_at": note.updated_at,
        "blocks": blocks,
    }))
}

/// JSON for one entry of the visible-notes list.
pub fn visible_note_to_json(
    storage: &Storage,
    v: &VisibleNote,
) -> Result<serde_json::Value, StorageError> {
    let mut value = note_to_json(storage, &v.note)?;
    value["is_own"] = serde_json::Value::Bool(v.is_own);
    value["author"] = match &v.author {
        Some(p) => profile_to_json(p),
        None => serde_json::Value::Null,
    };
    Ok(value)
}
