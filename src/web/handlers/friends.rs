//! Friend request and friendship handlers.
//!
//! A friendship is two directed rows. Sending a request creates one
//! pending row; accepting marks it accepted and writes the reverse row
//! in the same transaction; removing deletes both.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::storage::now_secs;
use crate::web::auth::require_user;
use crate::web::state::SharedState;
use crate::web::utils::{api_error, profile_to_json, storage_error_response};

#[derive(Deserialize)]
pub struct SendFriendRequestPayload {
    user_id: String,
}

pub async fn send_friend_request_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<SendFriendRequestPayload>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let target = req.user_id.trim().to_string();
    if target.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "user_id cannot be empty");
    }
    if target == user_id {
        return api_error(StatusCode::BAD_REQUEST, "cannot send a friend request to yourself");
    }

    let st = state.lock().await;
    match st.storage.get_profile(&target) {
        Ok(Some(_)) => {}
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such user"),
        Err(e) => return storage_error_response(e),
    }
    match st.storage.are_friends(&user_id, &target) {
        Ok(true) => return api_error(StatusCode::CONFLICT, "already friends"),
        Ok(false) => {}
        Err(e) => return storage_error_response(e),
    }
    match st.storage.find_friend_edge(&user_id, &target) {
        Ok(Some(_)) => return api_error(StatusCode::CONFLICT, "friend request already sent"),
        Ok(None) => {}
        Err(e) => return storage_error_response(e),
    }
    // An incoming pending request from the target completes the
    // friendship instead of creating a crossed second request.
    match st.storage.find_friend_edge(&target, &user_id) {
        Ok(Some(edge)) => {
            return match st.storage.accept_friend_request(edge.id, now_secs()) {
                Ok(_) => {
                    crate::dlog!(
                        "friend-request: crossed with {}, accepted",
                        crate::logging::user_id(&target)
                    );
                    axum::Json(serde_json::json!({ "id": edge.id, "status": "accepted" }))
                        .into_response()
                }
                Err(e) => storage_error_response(e),
            };
        }
        Ok(None) => {}
        Err(e) => return storage_error_response(e),
    }

    match st.storage.insert_friend_request(&user_id, &target, now_secs()) {
        Ok(request_id) => {
            crate::dlog!(
                "friend-request: {} -> {}",
                crate::logging::user_id(&user_id),
                crate::logging::user_id(&target)
            );
            (
                StatusCode::CREATED,
                axum::Json(serde_json::json!({ "id": request_id, "status": "pending" })),
            )
                .into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

/// Incoming pending requests for the current user, requester profiles
/// attached.
pub async fn list_friend_requests_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    match st.storage.list_incoming_requests(&user_id) {
        Ok(incoming) => {
            let requests: Vec<_> = incoming
                .iter()
                .map(|(edge, profile)| {
                    serde_json::json!({
                        "id": edge.id,
                        "from": profile_to_json(profile),
                        "created_at": edge.created_at,
                    })
                })
                .collect();
            axum::Json(serde_json::json!({ "requests": requests })).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

pub async fn accept_friend_request_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(request_id): Path<i64>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let edge = match st.storage.get_friend_edge(request_id) {
        Ok(Some(edge)) => edge,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such friend request"),
        Err(e) => return storage_error_response(e),
    };
    // Only the request's target may accept it.
    if edge.friend_id != user_id {
        return api_error(StatusCode::FORBIDDEN, "not your friend request");
    }
    if edge.status != "pending" {
        return api_error(StatusCode::CONFLICT, "request is not pending");
    }

    match st.storage.accept_friend_request(request_id, now_secs()) {
        Ok(edge) => {
            crate::dlog!(
                "friend-accept: {} <-> {}",
                crate::logging::user_id(&edge.user_id),
                crate::logging::user_id(&edge.friend_id)
            );
            axum::Json(serde_json::json!({ "id": edge.id, "status": "accepted" })).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

pub async fn decline_friend_request_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(request_id): Path<i64>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let edge = match st.storage.get_friend_edge(request_id) {
        Ok(Some(edge)) => edge,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such friend request"),
        Err(e) => return storage_error_response(e),
    };
    if edge.friend_id != user_id {
        return api_error(StatusCode::FORBIDDEN, "not your friend request");
    }

    match st.storage.delete_friend_edge(request_id) {
        Ok(_) => axum::Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => storage_error_response(e),
    }
}

pub async fn list_friends_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    match st.storage.list_friend_profiles(&user_id) {
        Ok(profiles) => {
            let friends: Vec<_> = profiles.iter().map(profile_to_json).collect();
            axum::Json(serde_json::json!({ "friends": friends })).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

/// Remove a friendship in both directions. Share grants between the two
/// users survive but stop granting visibility until they re-friend.
pub async fn remove_friend_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(friend_id): Path<String>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    match st.storage.are_friends(&user_id, &friend_id) {
        Ok(true) => {}
        Ok(false) => return api_error(StatusCode::NOT_FOUND, "not friends with this user"),
        Err(e) => return storage_error_response(e),
    }
    match st.storage.remove_friendship(&user_id, &friend_id) {
        Ok(()) => {
            crate::dlog!(
                "friend-remove: {} x {}",
                crate::logging::user_id(&user_id),
                crate::logging::user_id(&friend_id)
            );
            axum::Json(serde_json::json!({ "ok": true })).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}
