//! services/api/src/web/auth.rs
//!
//! Magic-link authentication: request a login link, redeem it for a session,
//! and log out.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Duration, Utc};
use family_photos_core::domain::{NewUser, User};
use family_photos_core::ports::PortError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::middleware::session_token;
use crate::web::state::{AppState, CurrentUser};
use crate::web::{reject, Rejection};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct MagicLinkRequest {
    pub email: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyParams {
    /// The one-time token from the emailed link.
    pub token: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    /// Also usable as an `Authorization: Bearer` credential.
    pub token: String,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

fn session_cookie(session_id: &str, max_age_secs: i64) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        session_id, max_age_secs
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/magic-link - Email a one-time login link
#[utoipa::path(
    post,
    path = "/auth/magic-link",
    request_body = MagicLinkRequest,
    responses(
        (status = 202, description = "Login link issued"),
        (status = 400, description = "Invalid email address"),
        (status = 403, description = "Registration is closed and the email is unknown")
    )
)]
pub async fn request_magic_link_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MagicLinkRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err((StatusCode::BAD_REQUEST, "Invalid email address".to_string()));
    }

    // 1. Closed registration only lets known users in.
    if !state.config.open_registration {
        match state.db.get_user_by_email(&email).await {
            Ok(_) => {}
            Err(PortError::NotFound(_)) => return Err(reject(PortError::Forbidden)),
            Err(e) => return Err(reject(e)),
        }
    }

    // 2. Store the token with its expiry
    let token = Uuid::new_v4().simple().to_string();
    let expires_at = Utc::now() + Duration::minutes(state.config.magic_link_ttl_minutes);
    state
        .db
        .create_magic_link(&token, &email, expires_at)
        .await
        .map_err(reject)?;

    // 3. Deliver the link
    let link = format!(
        "{}/auth/verify?token={}",
        state.config.public_base_url, token
    );
    state
        .mailer
        .send_magic_link(&email, &link)
        .await
        .map_err(|e| {
            error!("Failed to deliver magic link: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to send login link".to_string())
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "message": "Check your email for a login link" })),
    ))
}

/// GET /auth/verify - Redeem a login link for a session
#[utoipa::path(
    get,
    path = "/auth/verify",
    params(VerifyParams),
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid, used or expired link")
    )
)]
pub async fn verify_magic_link_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Result<impl IntoResponse, Rejection> {
    // 1. Consume the one-time token
    let email = state
        .db
        .consume_magic_link(&params.token)
        .await
        .map_err(|e| match e {
            PortError::NotFound(msg) => (StatusCode::UNAUTHORIZED, msg),
            other => reject(other),
        })?;

    // 2. Find the user, creating them on first login
    let user = match state.db.get_user_by_email(&email).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => {
            info!(%email, "Creating user on first login");
            state
                .db
                .create_user(NewUser::from_email(&email))
                .await
                .map_err(reject)?
        }
        Err(e) => return Err(reject(e)),
    };

    // 3. Create the auth session
    let auth_session_id = Uuid::new_v4().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);
    state
        .db
        .create_auth_session(&auth_session_id, user.id, Utc::now() + ttl)
        .await
        .map_err(reject)?;

    // 4. Return response with cookie
    let cookie = session_cookie(&auth_session_id, ttl.num_seconds());
    let response = AuthResponse {
        user_id: user.id,
        email: user.email,
        display_name: user.display_name,
        is_admin: user.is_admin,
        token: auth_session_id,
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Rejection> {
    let auth_session_id = session_token(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    Ok((StatusCode::OK, [(header::SET_COOKIE, session_cookie("", 0))]))
}

/// GET /auth/me - The signed-in user
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn me_handler(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<User> {
    Json(user)
}
