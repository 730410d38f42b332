//! Axum router construction.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::web::config::MAX_IMAGE_SIZE;
use crate::web::handlers;
use crate::web::state::SharedState;

/// Build the complete Axum router with all API routes.
///
/// `:note_ref` in the block and image routes accepts either a calendar
/// date (the caller's own journal) or a note id (any visible note).
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health::health_handler))
        // Auth
        .route("/api/auth/signup", post(handlers::auth::signup_handler))
        .route("/api/auth/login", post(handlers::auth::login_handler))
        .route("/api/auth/logout", post(handlers::auth::logout_handler))
        .route("/api/auth/me", get(handlers::auth::me_handler))
        // Profiles
        .route(
            "/api/profile",
            get(handlers::profiles::get_profile_handler)
                .put(handlers::profiles::update_profile_handler),
        )
        .route(
            "/api/users/search",
            get(handlers::profiles::search_users_handler),
        )
        // Friend graph
        .route(
            "/api/friend-requests",
            get(handlers::friends::list_friend_requests_handler)
                .post(handlers::friends::send_friend_request_handler),
        )
        .route(
            "/api/friend-requests/:request_id/accept",
            post(handlers::friends::accept_friend_request_handler),
        )
        .route(
            "/api/friend-requests/:request_id/decline",
            post(handlers::friends::decline_friend_request_handler),
        )
        .route("/api/friends", get(handlers::friends::list_friends_handler))
        .route(
            "/api/friends/:friend_id",
            delete(handlers::friends::remove_friend_handler),
        )
        // Notes
        .route("/api/dates", get(handlers::notes::list_dates_handler))
        .route(
            "/api/notes/:date",
            get(handlers::notes::get_notes_for_date_handler)
                .put(handlers::notes::update_note_handler),
        )
        // Blocks
        .route(
            "/api/notes/:note_ref/blocks",
            get(handlers::blocks::list_blocks_handler).post(handlers::blocks::create_block_handler),
        )
        .route(
            "/api/text-blocks/:block_id",
            put(handlers::blocks::update_text_block_handler)
                .delete(handlers::blocks::delete_text_block_handler),
        )
        .route(
            "/api/todos/:todo_id",
            delete(handlers::blocks::delete_todo_handler),
        )
        .route(
            "/api/todos/:todo_id/toggle",
            post(handlers::blocks::toggle_todo_handler),
        )
        // Images
        .route(
            "/api/notes/:note_ref/images",
            post(handlers::images::upload_image_handler)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE as usize + 1024)),
        )
        .route(
            "/api/images/file/:name",
            get(handlers::images::serve_image_handler),
        )
        .route(
            "/api/images/:image_id",
            delete(handlers::images::delete_image_handler),
        )
        // Shares
        .route(
            "/api/notes/:note_id/shares",
            get(handlers::shares::list_shares_handler).post(handlers::shares::create_share_handler),
        )
        .route(
            "/api/notes/:note_id/shares/:friend_id",
            delete(handlers::shares::delete_share_handler),
        )
        .with_state(state)
}
