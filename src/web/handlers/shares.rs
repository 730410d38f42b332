//! Share grant handlers. Owner-only: grants name an accepted friend who
//! may then see the note until the grant is revoked or the friendship
//! ends.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::storage::{now_secs, NoteRow, Storage};
use crate::web::auth::require_user;
use crate::web::state::SharedState;
use crate::web::utils::{api_error, profile_to_json, storage_error_response};

#[derive(Deserialize)]
pub struct SharePayload {
    friend_id: String,
}

/// Load a note and confirm the caller owns it. Non-owners get 404 so the
/// endpoint does not confirm the note exists.
fn owned_note(storage: &Storage, owner_id: &str, note_id: &str) -> Result<NoteRow, Response> {
    match storage.get_note(note_id) {
        Ok(Some(note)) if note.user_id == owner_id => Ok(note),
        Ok(_) => Err(api_error(StatusCode::NOT_FOUND, "no such note")),
        Err(e) => Err(storage_error_response(e)),
    }
}

pub async fn create_share_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(note_id): Path<String>,
    axum::Json(req): axum::Json<SharePayload>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let note = match owned_note(&st.storage, &user_id, &note_id) {
        Ok(note) => note,
        Err(resp) => return resp,
    };
    match st.storage.are_friends(&user_id, &req.friend_id) {
        Ok(true) => {}
        Ok(false) => {
            return api_error(StatusCode::BAD_REQUEST, "can only share with accepted friends")
        }
        Err(e) => return storage_error_response(e),
    }

    match st.storage.insert_share(&note.id, &user_id, &req.friend_id, now_secs()) {
        Ok(created) => {
            if created {
                crate::dlog!(
                    "share: {} granted {} on {}",
                    crate::logging::user_id(&user_id),
                    crate::logging::user_id(&req.friend_id),
                    crate::logging::note_id(&note.id)
                );
            }
            (
                StatusCode::CREATED,
                axum::Json(serde_json::json!({ "note_id": note.id, "friend_id": req.friend_id })),
            )
                .into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

pub async fn delete_share_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path((note_id, friend_id)): Path<(String, String)>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let note = match owned_note(&st.storage, &user_id, &note_id) {
        Ok(note) => note,
        Err(resp) => return resp,
    };
    // Revoking an absent grant is still a success; the end state is the same.
    match st.storage.delete_share(&note.id, &friend_id) {
        Ok(_) => axum::Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => storage_error_response(e),
    }
}

pub async fn list_shares_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(note_id): Path<String>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let note = match owned_note(&st.storage, &user_id, &note_id) {
        Ok(note) => note,
        Err(resp) => return resp,
    };
    match st.storage.list_share_grantees(&note.id) {
        Ok(grantees) => {
            let shared_with: Vec<_> = grantees.iter().map(profile_to_json).collect();
            axum::Json(serde_json::json!({ "note_id": note.id, "shared_with": shared_with }))
                .into_response()
        }
        Err(e) => storage_error_response(e),
    }
}
