//! Profile read/update and user search handlers.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::storage::ProfileRow;
use crate::web::auth::require_user;
use crate::web::config::{SEARCH_LIMIT, SEARCH_MIN_CHARS};
use crate::web::state::SharedState;
use crate::web::utils::{api_error, profile_to_json, storage_error_response, valid_username};

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateProfilePayload {
    username: Option<String>,
    full_name: Option<String>,
}

pub async fn get_profile_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    match st.storage.get_profile(&user_id) {
        Ok(Some(profile)) => axum::Json(profile_to_json(&profile)).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "profile not found"),
        Err(e) => storage_error_response(e),
    }
}

pub async fn update_profile_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<UpdateProfilePayload>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let username = match req.username.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(u) if !valid_username(u) => {
            return api_error(
                StatusCode::BAD_REQUEST,
                "username must be 2-32 ascii letters, digits, '_', '.' or '-'",
            )
        }
        Some(u) => Some(u.to_string()),
    };
    let full_name = match req.full_name.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(n) => Some(n.to_string()),
    };

    let profile = ProfileRow {
        id: user_id.clone(),
        username,
        full_name,
    };

    let st = state.lock().await;
    match st.storage.update_profile(&profile) {
        Ok(true) => axum::Json(profile_to_json(&profile)).into_response(),
        Ok(false) => api_error(StatusCode::NOT_FOUND, "profile not found"),
        Err(e) => storage_error_response(e),
    }
}

/// Search users by username substring. Short terms return an empty list
/// rather than scanning the whole directory.
pub async fn search_users_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let term = query.q.as_deref().unwrap_or("").trim().to_string();
    if term.chars().count() < SEARCH_MIN_CHARS {
        return axum::Json(serde_json::json!({ "users": [] })).into_response();
    }

    let st = state.lock().await;
    match st.storage.search_profiles(&term, &user_id, SEARCH_LIMIT) {
        Ok(profiles) => {
            let users: Vec<_> = profiles.iter().map(profile_to_json).collect();
            axum::Json(serde_json::json!({ "users": users })).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}
