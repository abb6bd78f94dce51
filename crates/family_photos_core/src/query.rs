//! crates/family_photos_core/src/query.rs
//!
//! The listing model: pagination, sort allow-lists and filter predicates.
//!
//! Storage adapters fold a `PhotoQuery` into a single parameterised query; no
//! caller-supplied text is ever interpolated into SQL. Sort columns are the only
//! identifiers that reach the query text, and they come from the enums below.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PHOTO_PAGE_SIZE: u32 = 20;
pub const DEFAULT_ALBUM_PAGE_SIZE: u32 = 10;
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

//=========================================================================================
// Pagination
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// Page numbers start at 1; limits are clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

/// One page of results.
///
/// `has_more` is true when the page came back full. That is an estimate: the
/// following page may turn out to be empty.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn from_fetch(items: Vec<T>, pagination: Pagination) -> Self {
        let has_more = items.len() == pagination.limit as usize;
        Self {
            items,
            page: pagination.page,
            limit: pagination.limit,
            has_more,
        }
    }
}

//=========================================================================================
// Sort allow-lists
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhotoSort {
    #[default]
    UploadedAt,
    TakenAt,
}

impl PhotoSort {
    pub fn column(&self) -> &'static str {
        match self {
            PhotoSort::UploadedAt => "p.uploaded_at",
            PhotoSort::TakenAt => "p.taken_at",
        }
    }
}

impl FromStr for PhotoSort {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploadedAt" | "uploaded_at" => Ok(PhotoSort::UploadedAt),
            "takenAt" | "taken_at" => Ok(PhotoSort::TakenAt),
            other => Err(PortError::InvalidInput(format!(
                "Unsupported photo sort '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlbumSort {
    #[default]
    CreatedAt,
    Name,
    PhotoCount,
}

impl AlbumSort {
    pub fn column(&self) -> &'static str {
        match self {
            AlbumSort::CreatedAt => "a.created_at",
            AlbumSort::Name => "a.name",
            AlbumSort::PhotoCount => "photo_count",
        }
    }
}

impl FromStr for AlbumSort {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" | "created_at" => Ok(AlbumSort::CreatedAt),
            "name" => Ok(AlbumSort::Name),
            "photoCount" | "photo_count" => Ok(AlbumSort::PhotoCount),
            other => Err(PortError::InvalidInput(format!(
                "Unsupported album sort '{}'",
                other
            ))),
        }
    }
}

//=========================================================================================
// Filters
//=========================================================================================

/// A single conjunctive condition on the photo listing.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoPredicate {
    /// The photo must carry every one of these (already normalised) tags.
    Tags(Vec<String>),
    Uploader(Uuid),
    Album(Uuid),
    UploadedFrom(DateTime<Utc>),
    /// Inclusive upper bound.
    UploadedUntil(DateTime<Utc>),
    /// Exclusive upper bound.
    UploadedBefore(DateTime<Utc>),
    HasLocation(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoQuery {
    pub pagination: Pagination,
    pub predicates: Vec<PhotoPredicate>,
    pub sort: PhotoSort,
}

impl PhotoQuery {
    pub fn new(pagination: Pagination) -> Self {
        Self {
            pagination,
            predicates: Vec::new(),
            sort: PhotoSort::default(),
        }
    }

    /// Adds a predicate. An empty tag list is dropped since it constrains nothing.
    pub fn with(mut self, predicate: PhotoPredicate) -> Self {
        if !matches!(&predicate, PhotoPredicate::Tags(tags) if tags.is_empty()) {
            self.predicates.push(predicate);
        }
        self
    }

    pub fn sorted_by(mut self, sort: PhotoSort) -> Self {
        self.sort = sort;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumQuery {
    pub pagination: Pagination,
    pub created_by: Option<Uuid>,
    pub sort: AlbumSort,
}

//=========================================================================================
// Tags
//=========================================================================================

/// Lowercases and trims a tag. Blank tags normalise to `None`.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().to_lowercase();
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

/// Normalises and deduplicates tags, keeping first-seen order.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.into_iter().filter_map(|t| normalize_tag(t.as_ref())) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Splits a comma-separated `tags` parameter.
pub fn parse_tag_list(csv: &str) -> Vec<String> {
    normalize_tags(csv.split(','))
}

//=========================================================================================
// Date bounds
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Start,
    End,
}

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD` date into an
/// upload-time predicate.
///
/// Timestamps are inclusive at either end. A bare end date becomes an
/// exclusive bound at the next midnight, so the whole day matches at any
/// stored precision.
pub fn parse_date_bound(raw: &str, kind: BoundKind) -> PortResult<PhotoPredicate> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        let ts = ts.with_timezone(&Utc);
        return Ok(match kind {
            BoundKind::Start => PhotoPredicate::UploadedFrom(ts),
            BoundKind::End => PhotoPredicate::UploadedUntil(ts),
        });
    }
    let invalid = || PortError::InvalidInput(format!("Invalid date '{}'", raw));
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?;
    let midnight = |day: NaiveDate| Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
    match kind {
        BoundKind::Start => Ok(PhotoPredicate::UploadedFrom(midnight(date))),
        BoundKind::End => {
            let next = date.succ_opt().ok_or_else(invalid)?;
            Ok(PhotoPredicate::UploadedBefore(midnight(next)))
        }
    }
}

//=========================================================================================
// Search
//=========================================================================================

/// A validated free-text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub limit: u32,
}

impl SearchQuery {
    pub fn new(term: Option<&str>, limit: Option<u32>) -> PortResult<Self> {
        let term = term.map(str::trim).unwrap_or_default();
        if term.is_empty() {
            return Err(PortError::InvalidInput(
                "Search query 'q' is required".to_string(),
            ));
        }
        Ok(Self {
            term: term.to_string(),
            limit: limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_PAGE_SIZE),
        })
    }

    /// `%term%` with LIKE wildcards escaped by `\`.
    pub fn like_pattern(&self) -> String {
        let mut escaped = String::with_capacity(self.term.len() + 2);
        escaped.push('%');
        for c in self.term.chars() {
            if matches!(c, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped.push('%');
        escaped
    }
}
