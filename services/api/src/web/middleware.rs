//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use family_photos_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::state::{AppState, CurrentUser};

/// Finds the auth session id in a `session=` cookie or an `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let from_cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .find_map(|c| c.trim().strip_prefix("session="))
        })
        .filter(|token| !token.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    })
}

/// Middleware that validates the auth session and loads the requesting user.
///
/// If valid, inserts a `CurrentUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized. Storage failures are 500s.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_token(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let user_id = state
        .db
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => {
                debug!("Rejected auth session");
                StatusCode::UNAUTHORIZED
            }
            other => {
                error!("Failed to validate auth session: {:?}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    let user = state.db.get_user(user_id).await.map_err(|e| match e {
        PortError::NotFound(_) => {
            error!("Auth session points at an unknown user");
            StatusCode::UNAUTHORIZED
        }
        other => {
            error!("Failed to load session user: {:?}", other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
