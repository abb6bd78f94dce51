//! services/api/src/web/social.rs
//!
//! Handlers that change shared content: comments, reactions, tags, photo
//! metadata and album names. Deletes and edits are limited to the author (or
//! uploader/creator) and admins.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use family_photos_core::domain::{ensure_can_modify, Location, PhotoUpdate, Target};
use family_photos_core::query::{normalize_tag, normalize_tags, DEFAULT_PHOTO_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::params::PageParams;
use crate::web::state::{AppState, CurrentUser};
use crate::web::{reject, Rejection};

const MAX_COMMENT_CHARS: usize = 2000;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReactionRequest {
    /// The emoji.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Serialize, ToSchema)]
pub struct ToggleReactionResponse {
    /// Whether the reaction is present after the toggle.
    pub active: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RenameAlbumRequest {
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LocationInput {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhotoRequest {
    pub caption: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    pub location: Option<LocationInput>,
}

fn validated_comment(content: &str) -> Result<&str, Rejection> {
    let content = content.trim();
    if content.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Comment cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Comment is longer than {} characters", MAX_COMMENT_CHARS),
        ));
    }
    Ok(content)
}

fn validated_reaction(kind: &str) -> Result<&str, Rejection> {
    let kind = kind.trim();
    if kind.is_empty() || kind.chars().count() > 16 {
        return Err((StatusCode::BAD_REQUEST, "Invalid reaction".to_string()));
    }
    Ok(kind)
}

fn validated_location(input: &LocationInput) -> Result<Location, Rejection> {
    if !(-90.0..=90.0).contains(&input.latitude) || !(-180.0..=180.0).contains(&input.longitude) {
        return Err((StatusCode::BAD_REQUEST, "Location is out of range".to_string()));
    }
    Ok(Location {
        latitude: input.latitude,
        longitude: input.longitude,
        altitude: input.altitude,
    })
}

//=========================================================================================
// Comments
//=========================================================================================

async fn list_comments(
    state: &AppState,
    target: Target,
    params: &PageParams,
) -> Result<impl IntoResponse, Rejection> {
    let page = state
        .db
        .list_comments(target, params.pagination(DEFAULT_PHOTO_PAGE_SIZE))
        .await
        .map_err(reject)?;
    Ok(Json(page))
}

async fn add_comment(
    state: &AppState,
    target: Target,
    author: Uuid,
    req: &CommentRequest,
) -> Result<impl IntoResponse, Rejection> {
    let content = validated_comment(&req.content)?;
    let comment = state
        .db
        .add_comment(target, author, content)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Comments on a photo, oldest first.
#[utoipa::path(
    get,
    path = "/photos/{photo_id}/comments",
    params(("photo_id" = Uuid, Path, description = "Photo id"), PageParams),
    responses((status = 200, description = "One page of comments"), (status = 404, description = "Photo not found"))
)]
pub async fn list_photo_comments_handler(
    State(state): State<Arc<AppState>>,
    Path(photo_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, Rejection> {
    list_comments(&state, Target::Photo(photo_id), &params).await
}

/// Comment on a photo.
#[utoipa::path(
    post,
    path = "/photos/{photo_id}/comments",
    params(("photo_id" = Uuid, Path, description = "Photo id")),
    request_body = CommentRequest,
    responses((status = 201, description = "Comment created"), (status = 400, description = "Empty comment"), (status = 404, description = "Photo not found"))
)]
pub async fn add_photo_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(photo_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, Rejection> {
    add_comment(&state, Target::Photo(photo_id), user.id, &req).await
}

/// Comments on an album, oldest first.
#[utoipa::path(
    get,
    path = "/albums/{album_id}/comments",
    params(("album_id" = Uuid, Path, description = "Album id"), PageParams),
    responses((status = 200, description = "One page of comments"), (status = 404, description = "Album not found"))
)]
pub async fn list_album_comments_handler(
    State(state): State<Arc<AppState>>,
    Path(album_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, Rejection> {
    list_comments(&state, Target::Album(album_id), &params).await
}

/// Comment on an album.
#[utoipa::path(
    post,
    path = "/albums/{album_id}/comments",
    params(("album_id" = Uuid, Path, description = "Album id")),
    request_body = CommentRequest,
    responses((status = 201, description = "Comment created"), (status = 404, description = "Album not found"))
)]
pub async fn add_album_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(album_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, Rejection> {
    add_comment(&state, Target::Album(album_id), user.id, &req).await
}

/// Delete a comment. Only its author or an admin may do this.
#[utoipa::path(
    delete,
    path = "/comments/{comment_id}",
    params(("comment_id" = Uuid, Path, description = "Comment id")),
    responses((status = 204, description = "Deleted"), (status = 403, description = "Not the author"), (status = 404, description = "Comment not found"))
)]
pub async fn delete_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, Rejection> {
    let comment = state.db.get_comment(comment_id).await.map_err(reject)?;
    ensure_can_modify(&user, comment.author_id).map_err(reject)?;
    state.db.delete_comment(comment_id).await.map_err(reject)?;
    info!(%comment_id, by = %user.id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Reactions
//=========================================================================================

/// React to a photo. Each call adds a new reaction.
#[utoipa::path(
    post,
    path = "/photos/{photo_id}/reactions",
    params(("photo_id" = Uuid, Path, description = "Photo id")),
    request_body = ReactionRequest,
    responses((status = 201, description = "Reaction added"), (status = 404, description = "Photo not found"))
)]
pub async fn add_photo_reaction_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(photo_id): Path<Uuid>,
    Json(req): Json<ReactionRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let kind = validated_reaction(&req.kind)?;
    let reaction = state
        .db
        .add_reaction(Target::Photo(photo_id), user.id, kind)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(reaction)))
}

/// Toggle an emoji reaction on an album.
#[utoipa::path(
    post,
    path = "/albums/{album_id}/reactions",
    params(("album_id" = Uuid, Path, description = "Album id")),
    request_body = ReactionRequest,
    responses((status = 200, description = "Toggled", body = ToggleReactionResponse), (status = 404, description = "Album not found"))
)]
pub async fn toggle_album_reaction_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(album_id): Path<Uuid>,
    Json(req): Json<ReactionRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let kind = validated_reaction(&req.kind)?;
    let active = state
        .db
        .toggle_album_reaction(album_id, user.id, kind)
        .await
        .map_err(reject)?;
    Ok(Json(ToggleReactionResponse { active }))
}

/// Delete a reaction. Only its author or an admin may do this.
#[utoipa::path(
    delete,
    path = "/reactions/{reaction_id}",
    params(("reaction_id" = Uuid, Path, description = "Reaction id")),
    responses((status = 204, description = "Deleted"), (status = 403, description = "Not the author"), (status = 404, description = "Reaction not found"))
)]
pub async fn delete_reaction_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(reaction_id): Path<Uuid>,
) -> Result<impl IntoResponse, Rejection> {
    let reaction = state.db.get_reaction(reaction_id).await.map_err(reject)?;
    ensure_can_modify(&user, reaction.author_id).map_err(reject)?;
    state.db.delete_reaction(reaction_id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Tags and Metadata
//=========================================================================================

/// Tag a photo. Tags are lowercased and deduplicated.
#[utoipa::path(
    post,
    path = "/photos/{photo_id}/tags",
    params(("photo_id" = Uuid, Path, description = "Photo id")),
    request_body = TagsRequest,
    responses((status = 200, description = "The photo's tags", body = TagsResponse), (status = 404, description = "Photo not found"))
)]
pub async fn add_tags_handler(
    State(state): State<Arc<AppState>>,
    Path(photo_id): Path<Uuid>,
    Json(req): Json<TagsRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let tags = normalize_tags(&req.tags);
    if tags.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No tags supplied".to_string()));
    }
    let tags = state
        .db
        .add_photo_tags(photo_id, &tags)
        .await
        .map_err(reject)?;
    Ok(Json(TagsResponse { tags }))
}

/// Remove a tag from a photo.
#[utoipa::path(
    delete,
    path = "/photos/{photo_id}/tags/{tag}",
    params(
        ("photo_id" = Uuid, Path, description = "Photo id"),
        ("tag" = String, Path, description = "Tag name")
    ),
    responses((status = 204, description = "Removed"), (status = 404, description = "Tag not on photo"))
)]
pub async fn remove_tag_handler(
    State(state): State<Arc<AppState>>,
    Path((photo_id, tag)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, Rejection> {
    let tag = normalize_tag(&tag)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "Tag cannot be blank".to_string()))?;
    state
        .db
        .remove_photo_tag(photo_id, &tag)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Edit a photo's caption, capture time or location.
#[utoipa::path(
    patch,
    path = "/photos/{photo_id}",
    params(("photo_id" = Uuid, Path, description = "Photo id")),
    request_body = UpdatePhotoRequest,
    responses((status = 200, description = "Updated photo"), (status = 403, description = "Not the uploader"), (status = 404, description = "Photo not found"))
)]
pub async fn update_photo_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(photo_id): Path<Uuid>,
    Json(req): Json<UpdatePhotoRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let existing = state.db.get_photo(photo_id).await.map_err(reject)?;
    ensure_can_modify(&user, existing.photo.uploaded_by).map_err(reject)?;

    let location = req.location.as_ref().map(validated_location).transpose()?;
    let update = PhotoUpdate {
        caption: req.caption.map(|c| c.trim().to_string()),
        taken_at: req.taken_at,
        location,
    };
    let photo = state
        .db
        .update_photo(photo_id, update)
        .await
        .map_err(reject)?;
    Ok(Json(photo))
}

/// Rename an album. Only its creator or an admin may do this.
#[utoipa::path(
    patch,
    path = "/albums/{album_id}",
    params(("album_id" = Uuid, Path, description = "Album id")),
    request_body = RenameAlbumRequest,
    responses((status = 200, description = "Renamed album"), (status = 403, description = "Not the creator"), (status = 404, description = "Album not found"))
)]
pub async fn rename_album_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(album_id): Path<Uuid>,
    Json(req): Json<RenameAlbumRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Album name cannot be empty".to_string()));
    }
    let album = state.db.get_album(album_id).await.map_err(reject)?;
    ensure_can_modify(&user, album.created_by).map_err(reject)?;
    let album = state
        .db
        .rename_album(album_id, name)
        .await
        .map_err(reject)?;
    Ok(Json(album))
}
