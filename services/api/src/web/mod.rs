pub mod admin;
pub mod auth;
pub mod middleware;
pub mod params;
pub mod rest;
pub mod social;
pub mod state;
pub mod uploads;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, StatusCode},
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use family_photos_core::domain::User;
use family_photos_core::ports::PortError;
use std::sync::Arc;
use tower_http::{services::ServeDir, set_header::SetResponseHeader, trace::TraceLayer};
use tracing::error;

pub use middleware::require_auth;
use state::AppState;

/// The error half of every handler's return type.
pub type Rejection = (StatusCode, String);

/// Maps a port failure onto an HTTP status. Unexpected errors are logged and
/// their details kept out of the response.
pub fn reject(e: PortError) -> Rejection {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
        PortError::Unexpected(msg) => {
            error!("Unexpected service error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

pub fn require_admin(user: &User) -> Result<(), Rejection> {
    if user.is_admin {
        Ok(())
    } else {
        Err(reject(PortError::Forbidden))
    }
}

/// Builds every API route on top of the shared state.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/magic-link", post(auth::request_magic_link_handler))
        .route("/auth/verify", get(auth::verify_magic_link_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/albums", get(rest::list_albums_handler))
        .route("/albums/{album_id}", patch(social::rename_album_handler))
        .route("/albums/{album_id}/photos", get(rest::album_photos_handler))
        .route(
            "/albums/{album_id}/comments",
            get(social::list_album_comments_handler).post(social::add_album_comment_handler),
        )
        .route("/albums/{album_id}/reactions", post(social::toggle_album_reaction_handler))
        .route("/photos", get(rest::list_photos_handler))
        .route(
            "/photos/{photo_id}",
            get(rest::get_photo_handler).patch(social::update_photo_handler),
        )
        .route("/photos/{photo_id}/tags", post(social::add_tags_handler))
        .route("/photos/{photo_id}/tags/{tag}", delete(social::remove_tag_handler))
        .route(
            "/photos/{photo_id}/comments",
            get(social::list_photo_comments_handler).post(social::add_photo_comment_handler),
        )
        .route("/photos/{photo_id}/reactions", post(social::add_photo_reaction_handler))
        .route("/comments/{comment_id}", delete(social::delete_comment_handler))
        .route("/reactions/{reaction_id}", delete(social::delete_reaction_handler))
        .route("/uploads", post(uploads::upload_handler))
        .route("/activity/recent", get(rest::recent_activity_handler))
        .route("/search", get(rest::search_handler))
        .route("/stats", get(rest::stats_handler))
        .route(
            "/admin/users",
            get(admin::list_users_handler).post(admin::create_user_handler),
        )
        .nest_service(
            "/media",
            SetResponseHeader::overriding(
                ServeDir::new(&state.config.media_root),
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
