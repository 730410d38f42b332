//! Handlers for the ordered block content of notes.
//!
//! Blocks live in three tables but form one sequence per note, ordered
//! by fractional key. Inserting "after block X" derives a key strictly
//! between X and its successor across all three kinds, so concurrent
//! inserts at different anchors never need a renumbering pass.
//!
//! Routes address notes by a `note_ref` path segment that is either a
//! calendar date (the caller's own journal, created lazily) or a note
//! id (any note visible to the caller, including shared ones).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::compose::{insertion_key, ContentBlock};
use crate::storage::{now_secs, NoteRow, Storage, TextBlockRow, TodoRow};
use crate::visibility::can_view_note;
use crate::web::auth::require_user;
use crate::web::state::SharedState;
use crate::web::utils::{api_error, is_date, load_blocks, storage_error_response};

#[derive(Deserialize)]
pub struct CreateBlockPayload {
    kind: String,
    content: Option<String>,
    text: Option<String>,
    after_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTextBlockPayload {
    content: String,
}

/// Resolve a `note_ref` path segment to a note the viewer may access.
/// A date refers to the viewer's own journal; `create` controls whether
/// a missing own note is created on the spot. Anything else is treated
/// as a note id and checked against the visibility policy.
pub(crate) fn resolve_note_ref(
    storage: &Storage,
    viewer_id: &str,
    note_ref: &str,
    create: bool,
) -> Result<NoteRow, Response> {
    if is_date(note_ref) {
        if create {
            return storage
                .ensure_note(viewer_id, note_ref, now_secs())
                .map_err(storage_error_response);
        }
        return match storage.get_note_by_owner_date(viewer_id, note_ref) {
            Ok(Some(note)) => Ok(note),
            Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "no note for this date")),
            Err(e) => Err(storage_error_response(e)),
        };
    }

    let note = match storage.get_note(note_ref) {
        Ok(Some(note)) => note,
        Ok(None) => return Err(api_error(StatusCode::NOT_FOUND, "no such note")),
        Err(e) => return Err(storage_error_response(e)),
    };
    match can_view_note(storage, viewer_id, &note) {
        // Invisible notes read as absent.
        Ok(true) => Ok(note),
        Ok(false) => Err(api_error(StatusCode::NOT_FOUND, "no such note")),
        Err(e) => Err(storage_error_response(e)),
    }
}

/// Author or note owner may modify a block; everyone else is read-only.
pub(crate) fn can_edit_block(viewer_id: &str, author_id: &str, note: &NoteRow) -> bool {
    viewer_id == author_id || viewer_id == note.user_id
}

pub async fn list_blocks_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(note_ref): Path<String>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let note = match resolve_note_ref(&st.storage, &user_id, &note_ref, false) {
        Ok(note) => note,
        Err(resp) => return resp,
    };
    match load_blocks(&st.storage, &note.id) {
        Ok(blocks) => {
            let blocks: Vec<_> = blocks.iter().map(|b| b.to_json()).collect();
            axum::Json(serde_json::json!({ "note_id": note.id, "blocks": blocks })).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

/// Create a text block or todo. The note is created first when the ref
/// is a date with no note yet; note creation and block insert share the
/// same lock scope so no other writer can slip between them.
pub async fn create_block_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(note_ref): Path<String>,
    axum::Json(req): axum::Json<CreateBlockPayload>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let note = match resolve_note_ref(&st.storage, &user_id, &note_ref, true) {
        Ok(note) => note,
        Err(resp) => return resp,
    };

    let blocks = match load_blocks(&st.storage, &note.id) {
        Ok(blocks) => blocks,
        Err(e) => return storage_error_response(e),
    };
    let order_key = match insertion_key(&blocks, req.after_id.as_deref()) {
        Some(key) => key,
        None => return api_error(StatusCode::NOT_FOUND, "after_id names no block in this note"),
    };

    let now = now_secs();
    let block = match req.kind.as_str() {
        "text" => {
            let row = TextBlockRow {
                id: uuid::Uuid::new_v4().to_string(),
                note_id: note.id.clone(),
                user_id: user_id.clone(),
                content: req.content.unwrap_or_default(),
                order_key,
                created_at: now,
            };
            if let Err(e) = st.storage.insert_text_block(&row) {
                return storage_error_response(e);
            }
            ContentBlock::Text(row)
        }
        "todo" => {
            let text = match req.text.or(req.content) {
                Some(text) if !text.trim().is_empty() => text,
                _ => return api_error(StatusCode::BAD_REQUEST, "todo text cannot be empty"),
            };
            let row = TodoRow {
                id: uuid::Uuid::new_v4().to_string(),
                note_id: note.id.clone(),
                user_id: user_id.clone(),
                text,
                completed: false,
                order_key,
                created_at: now,
            };
            if let Err(e) = st.storage.insert_todo(&row) {
                return storage_error_response(e);
            }
            ContentBlock::Todo(row)
        }
        other => {
            return api_error(StatusCode::BAD_REQUEST, format!("unknown block kind '{other}'"))
        }
    };

    if let Err(e) = st.storage.touch_note(&note.id, now) {
        return storage_error_response(e);
    }
    crate::dlog!(
        "block: {} added {} to {}",
        crate::logging::user_id(&user_id),
        req.kind,
        crate::logging::note_id(&note.id)
    );
    (StatusCode::CREATED, axum::Json(block.to_json())).into_response()
}

pub async fn update_text_block_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(block_id): Path<String>,
    axum::Json(req): axum::Json<UpdateTextBlockPayload>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let block = match st.storage.get_text_block(&block_id) {
        Ok(Some(block)) => block,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such text block"),
        Err(e) => return storage_error_response(e),
    };
    let note = match st.storage.get_note(&block.note_id) {
        Ok(Some(note)) => note,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such note"),
        Err(e) => return storage_error_response(e),
    };
    if !can_edit_block(&user_id, &block.user_id, &note) {
        return api_error(StatusCode::FORBIDDEN, "only the author or note owner may edit");
    }

    if let Err(e) = st.storage.update_text_block_content(&block_id, &req.content) {
        return storage_error_response(e);
    }
    if let Err(e) = st.storage.touch_note(&note.id, now_secs()) {
        return storage_error_response(e);
    }
    axum::Json(serde_json::json!({ "id": block_id, "content": req.content })).into_response()
}

pub async fn delete_text_block_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(block_id): Path<String>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let block = match st.storage.get_text_block(&block_id) {
        Ok(Some(block)) => block,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such text block"),
        Err(e) => return storage_error_response(e),
    };
    let note = match st.storage.get_note(&block.note_id) {
        Ok(Some(note)) => note,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such note"),
        Err(e) => return storage_error_response(e),
    };
    if !can_edit_block(&user_id, &block.user_id, &note) {
        return api_error(StatusCode::FORBIDDEN, "only the author or note owner may delete");
    }

    match st.storage.delete_text_block(&block_id) {
        Ok(_) => axum::Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => storage_error_response(e),
    }
}

/// Flip a todo's completed state. Anyone who can see the note may toggle,
/// so shared viewers can tick off joint items.
pub async fn toggle_todo_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(todo_id): Path<String>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let todo = match st.storage.get_todo(&todo_id) {
        Ok(Some(todo)) => todo,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such todo"),
        Err(e) => return storage_error_response(e),
    };
    let note = match st.storage.get_note(&todo.note_id) {
        Ok(Some(note)) => note,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such note"),
        Err(e) => return storage_error_response(e),
    };
    match can_view_note(&st.storage, &user_id, &note) {
        Ok(true) => {}
        Ok(false) => return api_error(StatusCode::NOT_FOUND, "no such todo"),
        Err(e) => return storage_error_response(e),
    }

    let completed = !todo.completed;
    if let Err(e) = st.storage.set_todo_completed(&todo_id, completed) {
        return storage_error_response(e);
    }
    if let Err(e) = st.storage.touch_note(&note.id, now_secs()) {
        return storage_error_response(e);
    }
    axum::Json(serde_json::json!({ "id": todo_id, "completed": completed })).into_response()
}

pub async fn delete_todo_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(todo_id): Path<String>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let todo = match st.storage.get_todo(&todo_id) {
        Ok(Some(todo)) => todo,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such todo"),
        Err(e) => return storage_error_response(e),
    };
    let note = match st.storage.get_note(&todo.note_id) {
        Ok(Some(note)) => note,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such note"),
        Err(e) => return storage_error_response(e),
    };
    if !can_edit_block(&user_id, &todo.user_id, &note) {
        return api_error(StatusCode::FORBIDDEN, "only the author or note owner may delete");
    }

    match st.storage.delete_todo(&todo_id) {
        Ok(_) => axum::Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => storage_error_response(e),
    }
}
