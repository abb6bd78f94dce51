//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the read-only REST endpoints (listings,
//! search, activity and statistics) and the master definition for the OpenAPI
//! specification.

use crate::web::params::{ActivityParams, AlbumListParams, PageParams, PhotoListParams, SearchParams};
use crate::web::state::AppState;
use crate::web::{reject, Rejection};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use chrono::{Duration, Utc};
use family_photos_core::domain::{Album, Photo};
use family_photos_core::query::{Page, PhotoPredicate, PhotoQuery, DEFAULT_PHOTO_PAGE_SIZE};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use utoipa::OpenApi;
use uuid::Uuid;

/// Uploads newer than this count towards the rolling figure in `/stats`.
const RECENT_UPLOAD_WINDOW_DAYS: i64 = 7;
const ACTIVITY_ITEM_LIMIT: u32 = 50;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_albums_handler,
        album_photos_handler,
        list_photos_handler,
        get_photo_handler,
        recent_activity_handler,
        search_handler,
        stats_handler,
        crate::web::auth::request_magic_link_handler,
        crate::web::auth::verify_magic_link_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::me_handler,
        crate::web::social::rename_album_handler,
        crate::web::social::update_photo_handler,
        crate::web::social::add_tags_handler,
        crate::web::social::remove_tag_handler,
        crate::web::social::list_photo_comments_handler,
        crate::web::social::add_photo_comment_handler,
        crate::web::social::list_album_comments_handler,
        crate::web::social::add_album_comment_handler,
        crate::web::social::delete_comment_handler,
        crate::web::social::add_photo_reaction_handler,
        crate::web::social::toggle_album_reaction_handler,
        crate::web::social::delete_reaction_handler,
        crate::web::uploads::upload_handler,
        crate::web::admin::list_users_handler,
        crate::web::admin::create_user_handler,
    ),
    components(
        schemas(
            crate::web::auth::MagicLinkRequest,
            crate::web::auth::AuthResponse,
            crate::web::social::CommentRequest,
            crate::web::social::ReactionRequest,
            crate::web::social::ToggleReactionResponse,
            crate::web::social::TagsRequest,
            crate::web::social::TagsResponse,
            crate::web::social::RenameAlbumRequest,
            crate::web::social::UpdatePhotoRequest,
            crate::web::social::LocationInput,
            crate::web::admin::CreateUserRequest,
        )
    ),
    tags(
        (name = "Family Photos API", description = "Albums, photos, comments and reactions for a family photo library.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// An album together with one page of its photos.
#[derive(Serialize)]
pub struct AlbumPhotosResponse {
    album: Album,
    #[serde(flatten)]
    photos: Page<Photo>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List albums, newest first by default.
#[utoipa::path(
    get,
    path = "/albums",
    params(AlbumListParams),
    responses(
        (status = 200, description = "One page of albums with live photo counts"),
        (status = 400, description = "Unsupported sort column"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_albums_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlbumListParams>,
) -> Result<impl IntoResponse, Rejection> {
    let query = params.into_query().map_err(reject)?;
    let page = state.db.list_albums(&query).await.map_err(reject)?;
    Ok(Json(page))
}

/// Album metadata plus one page of its photos.
#[utoipa::path(
    get,
    path = "/albums/{album_id}/photos",
    params(("album_id" = Uuid, Path, description = "Album id"), PageParams),
    responses(
        (status = 200, description = "Album and photos"),
        (status = 404, description = "Album not found")
    )
)]
pub async fn album_photos_handler(
    State(state): State<Arc<AppState>>,
    Path(album_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, Rejection> {
    let album = state.db.get_album(album_id).await.map_err(reject)?;
    let query = PhotoQuery::new(params.pagination(DEFAULT_PHOTO_PAGE_SIZE))
        .with(PhotoPredicate::Album(album_id));
    let photos = state.db.list_photos(&query).await.map_err(reject)?;
    Ok(Json(AlbumPhotosResponse { album, photos }))
}

/// List photos matching every supplied filter.
#[utoipa::path(
    get,
    path = "/photos",
    params(PhotoListParams),
    responses(
        (status = 200, description = "One page of photos"),
        (status = 400, description = "Malformed date or unsupported sort column"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_photos_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PhotoListParams>,
) -> Result<impl IntoResponse, Rejection> {
    let query = params.into_query().map_err(reject)?;
    debug!(predicates = query.predicates.len(), page = query.pagination.page, "Listing photos");
    let page = state.db.list_photos(&query).await.map_err(reject)?;
    Ok(Json(page))
}

/// A single photo with its tags, comments and reactions.
#[utoipa::path(
    get,
    path = "/photos/{photo_id}",
    params(("photo_id" = Uuid, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Photo detail"),
        (status = 404, description = "Photo not found")
    )
)]
pub async fn get_photo_handler(
    State(state): State<Arc<AppState>>,
    Path(photo_id): Path<Uuid>,
) -> Result<impl IntoResponse, Rejection> {
    let detail = state.db.get_photo(photo_id).await.map_err(reject)?;
    Ok(Json(detail))
}

/// Photos uploaded and comments written in the last few days.
#[utoipa::path(
    get,
    path = "/activity/recent",
    params(ActivityParams),
    responses((status = 200, description = "Recent photos and comments"))
)]
pub async fn recent_activity_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActivityParams>,
) -> Result<impl IntoResponse, Rejection> {
    let activity = state
        .db
        .recent_activity(params.days(), ACTIVITY_ITEM_LIMIT)
        .await
        .map_err(reject)?;
    Ok(Json(activity))
}

/// Substring search over captions, tag names and album names.
#[utoipa::path(
    get,
    path = "/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching photos, newest first"),
        (status = 400, description = "Missing search query")
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, Rejection> {
    let query = params.into_query().map_err(reject)?;
    let photos = state.db.search_photos(&query).await.map_err(reject)?;
    Ok(Json(photos))
}

/// Library totals, uploads in the last week and the ten most used tags.
#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Aggregate statistics"))
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, Rejection> {
    let since = Utc::now() - Duration::days(RECENT_UPLOAD_WINDOW_DAYS);
    let stats = state.db.stats(since).await.map_err(reject)?;
    Ok(Json(stats))
}
