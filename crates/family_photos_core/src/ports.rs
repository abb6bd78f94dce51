//! crates/family_photos_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases,
//! object storage or email delivery.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Album, Comment, NewPhoto, NewUser, Photo, PhotoDetail, PhotoUpdate, Reaction,
    RecentActivity, Stats, Target, User,
};
use crate::query::{AlbumQuery, Page, Pagination, PhotoQuery, SearchQuery};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, disk).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<User>;

    /// Every user, ordered by display name.
    async fn list_users(&self) -> PortResult<Vec<User>>;

    // --- Magic Links and Auth Sessions ---
    async fn create_magic_link(
        &self,
        token: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Marks the token used and returns its email. Fails with `NotFound` when the
    /// token is unknown, expired or already used.
    async fn consume_magic_link(&self, token: &str) -> PortResult<String>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Albums ---
    async fn create_album(&self, name: &str, created_by: Uuid) -> PortResult<Album>;

    async fn get_album(&self, album_id: Uuid) -> PortResult<Album>;

    async fn list_albums(&self, query: &AlbumQuery) -> PortResult<Page<Album>>;

    async fn rename_album(&self, album_id: Uuid, name: &str) -> PortResult<Album>;

    // --- Photos ---
    async fn create_photo(&self, new_photo: NewPhoto) -> PortResult<Photo>;

    async fn get_photo(&self, photo_id: Uuid) -> PortResult<PhotoDetail>;

    async fn list_photos(&self, query: &PhotoQuery) -> PortResult<Page<Photo>>;

    async fn update_photo(&self, photo_id: Uuid, update: PhotoUpdate) -> PortResult<Photo>;

    /// Attaches normalised tags; returns the photo's full tag list.
    async fn add_photo_tags(&self, photo_id: Uuid, tags: &[String]) -> PortResult<Vec<String>>;

    async fn remove_photo_tag(&self, photo_id: Uuid, tag: &str) -> PortResult<()>;

    // --- Read Models ---
    async fn search_photos(&self, query: &SearchQuery) -> PortResult<Vec<Photo>>;

    /// Photos and comments from the last `days` days, newest first.
    async fn recent_activity(&self, days: u32, limit: u32) -> PortResult<RecentActivity>;

    /// Library totals. `recent_since` bounds the rolling upload count.
    async fn stats(&self, recent_since: DateTime<Utc>) -> PortResult<Stats>;

    // --- Comments and Reactions ---
    async fn add_comment(&self, target: Target, author_id: Uuid, content: &str)
        -> PortResult<Comment>;

    async fn get_comment(&self, comment_id: Uuid) -> PortResult<Comment>;

    async fn list_comments(&self, target: Target, pagination: Pagination)
        -> PortResult<Page<Comment>>;

    async fn delete_comment(&self, comment_id: Uuid) -> PortResult<()>;

    async fn add_reaction(&self, target: Target, author_id: Uuid, kind: &str)
        -> PortResult<Reaction>;

    async fn get_reaction(&self, reaction_id: Uuid) -> PortResult<Reaction>;

    async fn delete_reaction(&self, reaction_id: Uuid) -> PortResult<()>;

    /// Adds the reaction when absent and removes it when present.
    /// Returns whether the reaction is active afterwards.
    async fn toggle_album_reaction(&self, album_id: Uuid, author_id: Uuid, kind: &str)
        -> PortResult<bool>;
}

/// Where uploaded image bytes live.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores the bytes under `key` and returns the public URL.
    async fn put(&self, key: &str, data: Bytes) -> PortResult<String>;
}

/// Delivers login links to users.
#[async_trait]
pub trait MagicLinkMailer: Send + Sync {
    async fn send_magic_link(&self, email: &str, link: &str) -> PortResult<()>;
}
