//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use family_photos_core::domain::{Location, NewPhoto, NewUser, Photo, User};
use family_photos_core::ports::DatabaseService;
use photos_api::adapters::{DbAdapter, LocalMediaStore, LogMailer};
use photos_api::config::Config;
use photos_api::web::state::AppState;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

/// An in-memory database that lives only as long as its single connection.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(":memory:")
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory SQLite")
}

pub async fn migrated(pool: SqlitePool) -> DbAdapter {
    let db = DbAdapter::new(pool);
    db.run_migrations().await.expect("Failed to run migrations");
    db
}

pub async fn test_db() -> DbAdapter {
    migrated(test_pool().await).await
}

pub async fn seed_user(db: &DbAdapter, email: &str, is_admin: bool) -> User {
    let mut new_user = NewUser::from_email(email);
    new_user.is_admin = is_admin;
    db.create_user(new_user).await.expect("Failed to seed user")
}

pub fn new_photo(uploaded_by: Uuid, tags: &[&str]) -> NewPhoto {
    let id = Uuid::new_v4();
    NewPhoto {
        id,
        url: format!("/media/{}.jpg", id),
        thumbnail_url: format!("/media/{}.jpg", id),
        caption: None,
        uploaded_by,
        album_id: None,
        taken_at: None,
        location: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub async fn seed_photo(db: &DbAdapter, uploaded_by: Uuid, tags: &[&str]) -> Photo {
    db.create_photo(new_photo(uploaded_by, tags))
        .await
        .expect("Failed to seed photo")
}

pub async fn seed_photo_in(db: &DbAdapter, uploaded_by: Uuid, album_id: Uuid) -> Photo {
    let mut photo = new_photo(uploaded_by, &[]);
    photo.album_id = Some(album_id);
    db.create_photo(photo).await.expect("Failed to seed photo")
}

pub async fn seed_located_photo(db: &DbAdapter, uploaded_by: Uuid) -> Photo {
    let mut photo = new_photo(uploaded_by, &[]);
    photo.location = Some(Location {
        latitude: 52.37,
        longitude: 4.89,
        altitude: None,
    });
    db.create_photo(photo).await.expect("Failed to seed photo")
}

pub fn test_config(media_root: &TempDir, open_registration: bool) -> Config {
    let media_root = media_root.path().display().to_string();
    let open_registration = open_registration.to_string();
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("sqlite::memory:".to_string()),
        "MEDIA_ROOT" => Some(media_root.clone()),
        "OPEN_REGISTRATION" => Some(open_registration.clone()),
        "PUBLIC_BASE_URL" => Some("http://photos.test".to_string()),
        _ => None,
    })
    .expect("Test config should be valid")
}

/// Application state over `db`, with media written to a temporary directory.
pub fn test_state(db: DbAdapter, media_root: &TempDir, open_registration: bool) -> Arc<AppState> {
    let config = test_config(media_root, open_registration);
    Arc::new(AppState {
        db: Arc::new(db),
        media: Arc::new(LocalMediaStore::new(media_root.path(), "/media")),
        mailer: Arc::new(LogMailer),
        config: Arc::new(config),
    })
}

/// Creates an auth session for `user` and returns its bearer token.
pub async fn login(db: &DbAdapter, user: &User) -> String {
    let token = Uuid::new_v4().to_string();
    db.create_auth_session(&token, user.id, chrono::Utc::now() + chrono::Duration::days(1))
        .await
        .expect("Failed to create auth session");
    token
}
