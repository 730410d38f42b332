//! Cookie-based session authentication.
//!
//! Sessions are random UUIDs held in memory and handed to the browser in
//! an HttpOnly cookie. Every authenticated handler resolves the cookie to
//! a user id through [`require_user`] before touching storage.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;

use crate::web::config::SESSION_COOKIE;
use crate::web::state::SharedState;
use crate::web::utils::api_error;

/// Extract the session id from the Cookie header, if present.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookies.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(&format!("{SESSION_COOKIE}=")) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Resolve the request's session cookie to a user id, or produce the 401
/// response the handler should return as-is.
pub async fn require_user(state: &SharedState, headers: &HeaderMap) -> Result<String, Response> {
    let session_id = match session_id_from_headers(headers) {
        Some(id) => id,
        None => return Err(api_error(StatusCode::UNAUTHORIZED, "not logged in")),
    };
    let st = state.lock().await;
    match st.sessions.get(&session_id) {
        Some(user_id) => Ok(user_id.clone()),
        None => Err(api_error(StatusCode::UNAUTHORIZED, "session expired")),
    }
}

/// Set-Cookie value establishing a session.
pub fn session_cookie(session_id: &str) -> String {
    format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax")
}

/// Set-Cookie value clearing the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_id_parsed_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc-123; other=1"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("abc-123".to_string()));
    }

    #[test]
    fn test_missing_or_empty_cookie_yields_none() {
        let headers = HeaderMap::new();
        assert!(session_id_from_headers(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session_id="));
        assert!(session_id_from_headers(&headers).is_none());
    }
}
