//! crates/family_photos_core/src/domain.rs
//!
//! Defines the core data structures for the photo sharing application.
//! These structs are independent of any database; they only know how to
//! serialize themselves for the JSON API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

//=========================================================================================
// People
//=========================================================================================

/// A family member with access to the photo library.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub groups: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user, either by an admin or on first magic-link login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub groups: Vec<String>,
}

impl NewUser {
    /// A regular member whose display name is derived from the email local part.
    pub fn from_email(email: &str) -> Self {
        let display_name = email.split('@').next().unwrap_or(email).to_string();
        Self {
            email: email.to_string(),
            display_name,
            is_admin: false,
            groups: Vec::new(),
        }
    }
}

/// Only the author of a comment/reaction (or an admin) may modify it.
pub fn ensure_can_modify(requester: &User, owner_id: Uuid) -> PortResult<()> {
    if requester.is_admin || requester.id == owner_id {
        Ok(())
    } else {
        Err(PortError::Forbidden)
    }
}

//=========================================================================================
// Photos and Albums
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: Uuid,
    pub url: String,
    pub thumbnail_url: String,
    pub caption: Option<String>,
    pub uploaded_by: Uuid,
    pub uploader_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub album_id: Option<Uuid>,
    pub taken_at: Option<DateTime<Utc>>,
    pub location: Option<Location>,
    pub tags: Vec<String>,
}

/// A photo together with its discussion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDetail {
    #[serde(flatten)]
    pub photo: Photo,
    pub comments: Vec<Comment>,
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub id: Uuid,
    pub url: String,
    pub thumbnail_url: String,
    pub caption: Option<String>,
    pub uploaded_by: Uuid,
    pub album_id: Option<Uuid>,
    pub taken_at: Option<DateTime<Utc>>,
    pub location: Option<Location>,
    pub tags: Vec<String>,
}

/// Partial update of a photo's metadata. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PhotoUpdate {
    pub caption: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    pub location: Option<Location>,
}

/// An upload session. `photo_count` and `creator_name` are computed at read time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub creator_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub photo_count: i64,
}

//=========================================================================================
// Comments and Reactions
//=========================================================================================

/// What a comment or reaction is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Photo(Uuid),
    Album(Uuid),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub photo_id: Option<Uuid>,
    pub album_id: Option<Uuid>,
    pub author_id: Uuid,
    pub author_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: Uuid,
    pub photo_id: Option<Uuid>,
    pub album_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: String,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Aggregates
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_photos: i64,
    pub total_albums: i64,
    pub total_users: i64,
    pub recent_uploads: i64,
    pub top_tags: Vec<TagCount>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub days: u32,
    pub photos: Vec<Photo>,
    pub comments: Vec<Comment>,
}
