//! Signup, login, logout and current-user handlers.
//!
//! Passwords are bcrypt-hashed; hashing and verification run on the
//! blocking pool so the cost factor never stalls the async executor.
//! A successful signup or login installs a session and returns its
//! cookie.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::storage::{now_secs, ProfileRow, UserRow};
use crate::web::auth::{clear_session_cookie, require_user, session_cookie, session_id_from_headers};
use crate::web::state::SharedState;
use crate::web::utils::{api_error, profile_to_json, storage_error_response, valid_username};

#[derive(Deserialize)]
pub struct SignupPayload {
    email: String,
    password: String,
    username: Option<String>,
    full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginPayload {
    email: String,
    password: String,
}

pub async fn signup_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<SignupPayload>,
) -> Response {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return api_error(StatusCode::BAD_REQUEST, "invalid email address");
    }
    if req.password.len() < 8 {
        return api_error(StatusCode::BAD_REQUEST, "password must be at least 8 characters");
    }
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

    let password = req.password.clone();
    let password_hash =
        match tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
            .await
        {
            Ok(Ok(hash)) => hash,
            _ => return api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to hash password"),
        };

    let user = UserRow {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        password_hash,
        created_at: now_secs(),
    };
    let profile = ProfileRow {
        id: user.id.clone(),
        username,
        full_name: req.full_name.clone(),
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    {
        let mut st = state.lock().await;
        if let Err(e) = st.storage.insert_user_with_profile(&user, &profile) {
            return storage_error_response(e);
        }
        st.sessions.insert(session_id.clone(), user.id.clone());
    }

    crate::dlog!("signup: new user {}", crate::logging::user_id(&user.id));

    (
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&session_id))],
        axum::Json(serde_json::json!({
            "id": user.id,
            "email": user.email,
            "username": profile.username,
            "full_name": profile.full_name,
        })),
    )
        .into_response()
}

pub async fn login_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<LoginPayload>,
) -> Response {
    let email = req.email.trim().to_lowercase();

    let user = {
        let st = state.lock().await;
        match st.storage.get_user_by_email(&email) {
            Ok(user) => user,
            Err(e) => return storage_error_response(e),
        }
    };
    // Same response for unknown email and bad password.
    let user = match user {
        Some(user) => user,
        None => return api_error(StatusCode::UNAUTHORIZED, "invalid email or password"),
    };

    let password = req.password.clone();
    let hash = user.password_hash.clone();
    let valid = match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await {
        Ok(Ok(valid)) => valid,
        _ => return api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to verify password"),
    };
    if !valid {
        return api_error(StatusCode::UNAUTHORIZED, "invalid email or password");
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    {
        let mut st = state.lock().await;
        st.sessions.insert(session_id.clone(), user.id.clone());
    }

    crate::dlog!("login: {}", crate::logging::user_id(&user.id));

    (
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session_id))],
        axum::Json(serde_json::json!({ "id": user.id, "email": user.email })),
    )
        .into_response()
}

pub async fn logout_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Some(session_id) = session_id_from_headers(&headers) {
        let mut st = state.lock().await;
        st.sessions.remove(&session_id);
    }
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie())],
        axum::Json(serde_json::json!({ "ok": true })),
    )
        .into_response()
}

pub async fn me_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let user = match st.storage.get_user(&user_id) {
        Ok(Some(user)) => user,
        Ok(None) => return api_error(StatusCode::UNAUTHORIZED, "account no longer exists"),
        Err(e) => return storage_error_response(e),
    };
    let profile = match st.storage.get_profile(&user_id) {
        Ok(profile) => profile,
        Err(e) => return storage_error_response(e),
    };

    let mut body = serde_json::json!({ "id": user.id, "email": user.email });
    if let Some(p) = profile {
        body["profile"] = profile_to_json(&p);
    }
    axum::Json(body).into_response()
}
