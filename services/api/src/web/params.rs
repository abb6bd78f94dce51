//! services/api/src/web/params.rs
//!
//! Query-string shapes for the listing endpoints and their conversion into the
//! core query model.

use family_photos_core::ports::PortResult;
use family_photos_core::query::{
    parse_date_bound, parse_tag_list, AlbumQuery, AlbumSort, BoundKind, Pagination,
    PhotoPredicate, PhotoQuery, PhotoSort, SearchQuery, DEFAULT_ALBUM_PAGE_SIZE,
    DEFAULT_PHOTO_PAGE_SIZE,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

pub const DEFAULT_ACTIVITY_DAYS: u32 = 7;
pub const MAX_ACTIVITY_DAYS: u32 = 365;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number.
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn pagination(&self, default_limit: u32) -> Pagination {
        Pagination::new(self.page, self.limit, default_limit)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AlbumListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Only albums created by this user.
    pub user: Option<Uuid>,
    /// `createdAt` (default), `name` or `photoCount`.
    pub sort: Option<String>,
}

impl AlbumListParams {
    pub fn into_query(self) -> PortResult<AlbumQuery> {
        let sort = match self.sort.as_deref() {
            Some(raw) => raw.parse::<AlbumSort>()?,
            None => AlbumSort::default(),
        };
        Ok(AlbumQuery {
            pagination: Pagination::new(self.page, self.limit, DEFAULT_ALBUM_PAGE_SIZE),
            created_by: self.user,
            sort,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PhotoListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Comma-separated; a photo must carry every listed tag.
    pub tags: Option<String>,
    /// Uploader id.
    pub user: Option<Uuid>,
    pub album: Option<Uuid>,
    /// Inclusive lower bound on upload time (RFC 3339 or `YYYY-MM-DD`).
    pub start_date: Option<String>,
    /// Inclusive upper bound on upload time (RFC 3339 or `YYYY-MM-DD`).
    pub end_date: Option<String>,
    pub has_location: Option<bool>,
    /// `uploadedAt` (default) or `takenAt`.
    pub sort: Option<String>,
}

impl PhotoListParams {
    pub fn into_query(self) -> PortResult<PhotoQuery> {
        let mut query =
            PhotoQuery::new(Pagination::new(self.page, self.limit, DEFAULT_PHOTO_PAGE_SIZE));

        if let Some(tags) = self.tags.as_deref() {
            query = query.with(PhotoPredicate::Tags(parse_tag_list(tags)));
        }
        if let Some(user) = self.user {
            query = query.with(PhotoPredicate::Uploader(user));
        }
        if let Some(album) = self.album {
            query = query.with(PhotoPredicate::Album(album));
        }
        if let Some(start) = self.start_date.as_deref() {
            query = query.with(parse_date_bound(start, BoundKind::Start)?);
        }
        if let Some(end) = self.end_date.as_deref() {
            query = query.with(parse_date_bound(end, BoundKind::End)?);
        }
        if let Some(has_location) = self.has_location {
            query = query.with(PhotoPredicate::HasLocation(has_location));
        }
        if let Some(sort) = self.sort.as_deref() {
            query = query.sorted_by(sort.parse::<PhotoSort>()?);
        }
        Ok(query)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Text matched against captions, tags and album names.
    pub q: Option<String>,
    pub limit: Option<u32>,
}

impl SearchParams {
    pub fn into_query(self) -> PortResult<SearchQuery> {
        SearchQuery::new(self.q.as_deref(), self.limit)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityParams {
    /// Look-back window in days (default 7).
    pub days: Option<u32>,
}

impl ActivityParams {
    pub fn days(&self) -> u32 {
        self.days
            .unwrap_or(DEFAULT_ACTIVITY_DAYS)
            .clamp(1, MAX_ACTIVITY_DAYS)
    }
}
