//! services/api/src/web/admin.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use family_photos_core::domain::NewUser;
use family_photos_core::query::normalize_tags;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::web::auth::is_valid_email;
use crate::web::state::{AppState, CurrentUser};
use crate::web::{reject, require_admin, Rejection};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    /// Defaults to the local part of the email.
    pub display_name: Option<String>,
    pub is_admin: Option<bool>,
    pub groups: Option<Vec<String>>,
}

/// GET /admin/users - Every user, by display name (case-insensitive)
#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "All users, by display name"), (status = 403, description = "Not an admin"))
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, Rejection> {
    require_admin(&user)?;
    let users = state.db.list_users().await.map_err(reject)?;
    Ok(Json(users))
}

/// POST /admin/users - Pre-register a family member
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Invalid or duplicate email"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, Rejection> {
    require_admin(&admin)?;

    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err((StatusCode::BAD_REQUEST, "Invalid email address".to_string()));
    }

    let mut new_user = NewUser::from_email(&email);
    if let Some(name) = req.display_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        new_user.display_name = name.to_string();
    }
    new_user.is_admin = req.is_admin.unwrap_or(false);
    new_user.groups = normalize_tags(req.groups.unwrap_or_default());

    let user = state.db.create_user(new_user).await.map_err(reject)?;
    info!(user_id = %user.id, by = %admin.id, "User created by admin");
    Ok((StatusCode::CREATED, Json(user)))
}
