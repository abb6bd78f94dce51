//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the SQLite database using `sqlx`.
//!
//! Listing queries are assembled with `sqlx::QueryBuilder`; every filter value is
//! bound as a parameter.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use family_photos_core::domain::{
    Album, Comment, Location, NewPhoto, NewUser, Photo, PhotoDetail, PhotoUpdate, Reaction,
    RecentActivity, Stats, TagCount, Target, User,
};
use family_photos_core::ports::{DatabaseService, PortError, PortResult};
use family_photos_core::query::{
    normalize_tag, AlbumQuery, Page, Pagination, PhotoPredicate, PhotoQuery, SearchQuery,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

const PHOTO_SELECT: &str = "SELECT p.id, p.url, p.thumbnail_url, p.caption, p.uploaded_by, \
     u.display_name AS uploader_name, p.uploaded_at, p.album_id, p.taken_at, \
     p.latitude, p.longitude, p.altitude \
     FROM photos p LEFT JOIN users u ON u.id = p.uploaded_by";

const ALBUM_SELECT: &str = "SELECT a.id, a.name, a.created_by, u.display_name AS creator_name, \
     a.created_at, (SELECT COUNT(*) FROM photos p WHERE p.album_id = a.id) AS photo_count \
     FROM albums a LEFT JOIN users u ON u.id = a.created_by";

const COMMENT_SELECT: &str = "SELECT c.id, c.photo_id, c.album_id, c.author_id, \
     u.display_name AS author_name, c.content, c.created_at \
     FROM comments c LEFT JOIN users u ON u.id = c.author_id";

const REACTION_SELECT: &str =
    "SELECT id, photo_id, album_id, kind, author_id, created_at FROM reactions";

const TOP_TAG_COUNT: i64 = 10;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the SQLite database at `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Loads tags for a batch of photo rows with a single `IN (...)` query.
    async fn with_tags(&self, records: Vec<PhotoRecord>) -> PortResult<Vec<Photo>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT pt.photo_id, t.name FROM photo_tags pt JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.photo_id IN (",
        );
        {
            let mut ids = qb.separated(", ");
            for record in &records {
                ids.push_bind(record.id);
            }
        }
        qb.push(") ORDER BY t.name ASC");

        let rows: Vec<(Uuid, String)> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut tags_by_photo: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (photo_id, name) in rows {
            tags_by_photo.entry(photo_id).or_default().push(name);
        }

        Ok(records
            .into_iter()
            .map(|r| {
                let tags = tags_by_photo.remove(&r.id).unwrap_or_default();
                r.to_domain(tags)
            })
            .collect())
    }

    async fn fetch_photo(&self, photo_id: Uuid) -> PortResult<Photo> {
        let record = sqlx::query_as::<_, PhotoRecord>(&format!("{} WHERE p.id = ?", PHOTO_SELECT))
            .bind(photo_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Photo {} not found", photo_id)))?;

        let mut photos = self.with_tags(vec![record]).await?;
        photos
            .pop()
            .ok_or_else(|| PortError::NotFound(format!("Photo {} not found", photo_id)))
    }

    async fn fetch_groups(&self, user_id: Uuid) -> PortResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT group_name FROM user_groups WHERE user_id = ? ORDER BY group_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn fetch_user_where(&self, column: &'static str, value: UserKey<'_>) -> PortResult<User> {
        let sql = format!(
            "SELECT id, email, display_name, is_admin, created_at FROM users WHERE {} = ?",
            column
        );
        let query = sqlx::query_as::<_, UserRecord>(&sql);
        let query = match value {
            UserKey::Id(id) => query.bind(id),
            UserKey::Email(email) => query.bind(email.to_lowercase()),
        };
        let record = query
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", value)))?;

        let groups = self.fetch_groups(record.id).await?;
        Ok(record.to_domain(groups))
    }

    async fn ensure_target_exists(&self, target: Target) -> PortResult<()> {
        let (sql, id, what) = match target {
            Target::Photo(id) => ("SELECT 1 FROM photos WHERE id = ?", id, "Photo"),
            Target::Album(id) => ("SELECT 1 FROM albums WHERE id = ?", id, "Album"),
        };
        let found = sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match found {
            Some(_) => Ok(()),
            None => Err(PortError::NotFound(format!("{} {} not found", what, id))),
        }
    }

    async fn photo_tags(&self, photo_id: Uuid) -> PortResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT t.name FROM photo_tags pt JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.photo_id = ? ORDER BY t.name ASC",
        )
        .bind(photo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    //=====================================================================================
    // Maintenance (used by the `normalize-tags` job)
    //=====================================================================================

    /// Returns up to `limit` tags with an id greater than `after_id`, in id order.
    pub async fn tags_after(&self, after_id: i64, limit: i64) -> Result<Vec<(i64, String)>, sqlx::Error> {
        sqlx::query_as::<_, (i64, String)>(
            "SELECT id, name FROM tags WHERE id > ? ORDER BY id ASC LIMIT ?",
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Folds a tag into its normalised form, moving its photo links across.
    /// Blank tags are simply deleted.
    pub async fn merge_tag(&self, tag_id: i64, name: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if let Some(normalized) = normalize_tag(name) {
            sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                .bind(&normalized)
                .execute(&mut *tx)
                .await?;
            let target_id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
                .bind(&normalized)
                .fetch_one(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT OR IGNORE INTO photo_tags (photo_id, tag_id) \
                 SELECT photo_id, ? FROM photo_tags WHERE tag_id = ?",
            )
            .bind(target_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM photo_tags WHERE tag_id = ?")
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }
}

/// Lookup key for `fetch_user_where`.
#[derive(Clone, Copy)]
enum UserKey<'a> {
    Id(Uuid),
    Email(&'a str),
}

impl std::fmt::Display for UserKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserKey::Id(id) => write!(f, "{}", id),
            UserKey::Email(email) => write!(f, "{}", email),
        }
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn target_columns(target: Target) -> (Option<Uuid>, Option<Uuid>) {
    match target {
        Target::Photo(id) => (Some(id), None),
        Target::Album(id) => (None, Some(id)),
    }
}

/// Inserts the (already normalised) tags and links them to the photo.
async fn link_tags(
    conn: &mut SqliteConnection,
    photo_id: Uuid,
    tags: &[String],
) -> Result<(), sqlx::Error> {
    for tag in tags {
        sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(tag)
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            "INSERT OR IGNORE INTO photo_tags (photo_id, tag_id) SELECT ?, id FROM tags WHERE name = ?",
        )
        .bind(photo_id)
        .bind(tag)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Appends one filter as an `AND` clause.
fn push_photo_predicate(qb: &mut QueryBuilder<'_, Sqlite>, predicate: &PhotoPredicate) {
    match predicate {
        PhotoPredicate::Tags(tags) => {
            qb.push(
                " AND p.id IN (SELECT pt.photo_id FROM photo_tags pt \
                 JOIN tags t ON t.id = pt.tag_id WHERE t.name IN (",
            );
            {
                let mut names = qb.separated(", ");
                for tag in tags {
                    names.push_bind(tag.clone());
                }
            }
            qb.push(") GROUP BY pt.photo_id HAVING COUNT(DISTINCT t.name) = ");
            qb.push_bind(tags.len() as i64);
            qb.push(")");
        }
        PhotoPredicate::Uploader(user_id) => {
            qb.push(" AND p.uploaded_by = ");
            qb.push_bind(*user_id);
        }
        PhotoPredicate::Album(album_id) => {
            qb.push(" AND p.album_id = ");
            qb.push_bind(*album_id);
        }
        PhotoPredicate::UploadedFrom(from) => {
            qb.push(" AND p.uploaded_at >= ");
            qb.push_bind(*from);
        }
        PhotoPredicate::UploadedUntil(until) => {
            qb.push(" AND p.uploaded_at <= ");
            qb.push_bind(*until);
        }
        PhotoPredicate::UploadedBefore(before) => {
            qb.push(" AND p.uploaded_at < ");
            qb.push_bind(*before);
        }
        PhotoPredicate::HasLocation(true) => {
            qb.push(" AND p.latitude IS NOT NULL AND p.longitude IS NOT NULL");
        }
        PhotoPredicate::HasLocation(false) => {
            qb.push(" AND (p.latitude IS NULL OR p.longitude IS NULL)");
        }
    }
}

fn push_pagination(qb: &mut QueryBuilder<'_, Sqlite>, pagination: Pagination) {
    qb.push(" LIMIT ");
    qb.push_bind(i64::from(pagination.limit));
    qb.push(" OFFSET ");
    qb.push_bind(pagination.offset());
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    display_name: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self, groups: Vec<String>) -> User {
        User {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            is_admin: self.is_admin,
            groups,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct PhotoRecord {
    id: Uuid,
    url: String,
    thumbnail_url: String,
    caption: Option<String>,
    uploaded_by: Uuid,
    uploader_name: Option<String>,
    uploaded_at: DateTime<Utc>,
    album_id: Option<Uuid>,
    taken_at: Option<DateTime<Utc>>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
}
impl PhotoRecord {
    fn to_domain(self, tags: Vec<String>) -> Photo {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location {
                latitude,
                longitude,
                altitude: self.altitude,
            }),
            _ => None,
        };
        Photo {
            id: self.id,
            url: self.url,
            thumbnail_url: self.thumbnail_url,
            caption: self.caption,
            uploaded_by: self.uploaded_by,
            uploader_name: self.uploader_name,
            uploaded_at: self.uploaded_at,
            album_id: self.album_id,
            taken_at: self.taken_at,
            location,
            tags,
        }
    }
}

#[derive(FromRow)]
struct AlbumRecord {
    id: Uuid,
    name: String,
    created_by: Uuid,
    creator_name: Option<String>,
    created_at: DateTime<Utc>,
    photo_count: i64,
}
impl AlbumRecord {
    fn to_domain(self) -> Album {
        Album {
            id: self.id,
            name: self.name,
            created_by: self.created_by,
            creator_name: self.creator_name,
            created_at: self.created_at,
            photo_count: self.photo_count,
        }
    }
}

#[derive(FromRow)]
struct CommentRecord {
    id: Uuid,
    photo_id: Option<Uuid>,
    album_id: Option<Uuid>,
    author_id: Uuid,
    author_name: Option<String>,
    content: String,
    created_at: DateTime<Utc>,
}
impl CommentRecord {
    fn to_domain(self) -> Comment {
        Comment {
            id: self.id,
            photo_id: self.photo_id,
            album_id: self.album_id,
            author_id: self.author_id,
            author_name: self.author_name,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ReactionRecord {
    id: Uuid,
    photo_id: Option<Uuid>,
    album_id: Option<Uuid>,
    kind: String,
    author_id: Uuid,
    created_at: DateTime<Utc>,
}
impl ReactionRecord {
    fn to_domain(self) -> Reaction {
        Reaction {
            id: self.id,
            photo_id: self.photo_id,
            album_id: self.album_id,
            kind: self.kind,
            author_id: self.author_id,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// DatabaseService Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let id = Uuid::new_v4();
        let email = new_user.email.trim().to_lowercase();
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO users (id, email, display_name, is_admin, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&email)
        .bind(&new_user.display_name)
        .bind(new_user.is_admin)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::InvalidInput(format!("User {} already exists", email))
            }
            _ => unexpected(e),
        })?;

        for group in &new_user.groups {
            sqlx::query("INSERT OR IGNORE INTO user_groups (user_id, group_name) VALUES (?, ?)")
                .bind(id)
                .bind(group)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        self.get_user(id).await
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.fetch_user_where("id", UserKey::Id(user_id)).await
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<User> {
        self.fetch_user_where("email", UserKey::Email(email.trim())).await
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, display_name, is_admin, created_at FROM users ORDER BY display_name COLLATE NOCASE ASC, email ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let memberships = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT user_id, group_name FROM user_groups ORDER BY group_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut groups: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (user_id, group) in memberships {
            groups.entry(user_id).or_default().push(group);
        }

        Ok(records
            .into_iter()
            .map(|r| {
                let user_groups = groups.remove(&r.id).unwrap_or_default();
                r.to_domain(user_groups)
            })
            .collect())
    }

    async fn create_magic_link(
        &self,
        token: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO magic_links (token, email, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(email.trim().to_lowercase())
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn consume_magic_link(&self, token: &str) -> PortResult<String> {
        let now = Utc::now();
        sqlx::query_scalar::<_, String>(
            "UPDATE magic_links SET used_at = ? \
             WHERE token = ? AND used_at IS NULL AND expires_at > ? RETURNING email",
        )
        .bind(now)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound("Login link is invalid or has expired".to_string()))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = ? AND expires_at > ?",
        )
        .bind(session_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_album(&self, name: &str, created_by: Uuid) -> PortResult<Album> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO albums (id, name, created_by, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(created_by)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        self.get_album(id).await
    }

    async fn get_album(&self, album_id: Uuid) -> PortResult<Album> {
        let record = sqlx::query_as::<_, AlbumRecord>(&format!("{} WHERE a.id = ?", ALBUM_SELECT))
            .bind(album_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Album {} not found", album_id)))?;
        Ok(record.to_domain())
    }

    async fn list_albums(&self, query: &AlbumQuery) -> PortResult<Page<Album>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(ALBUM_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(creator) = query.created_by {
            qb.push(" AND a.created_by = ");
            qb.push_bind(creator);
        }
        qb.push(format!(" ORDER BY {} DESC, a.id DESC", query.sort.column()));
        push_pagination(&mut qb, query.pagination);

        let records: Vec<AlbumRecord> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let albums = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(Page::from_fetch(albums, query.pagination))
    }

    async fn rename_album(&self, album_id: Uuid, name: &str) -> PortResult<Album> {
        let result = sqlx::query("UPDATE albums SET name = ? WHERE id = ?")
            .bind(name)
            .bind(album_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Album {} not found", album_id)));
        }
        self.get_album(album_id).await
    }

    async fn create_photo(&self, new_photo: NewPhoto) -> PortResult<Photo> {
        let (latitude, longitude, altitude) = match new_photo.location {
            Some(loc) => (Some(loc.latitude), Some(loc.longitude), loc.altitude),
            None => (None, None, None),
        };
        let tags = family_photos_core::query::normalize_tags(&new_photo.tags);

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO photos (id, url, thumbnail_url, caption, uploaded_by, uploaded_at, \
             album_id, taken_at, latitude, longitude, altitude) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_photo.id)
        .bind(&new_photo.url)
        .bind(&new_photo.thumbnail_url)
        .bind(&new_photo.caption)
        .bind(new_photo.uploaded_by)
        .bind(Utc::now())
        .bind(new_photo.album_id)
        .bind(new_photo.taken_at)
        .bind(latitude)
        .bind(longitude)
        .bind(altitude)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        link_tags(&mut *tx, new_photo.id, &tags)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;

        self.fetch_photo(new_photo.id).await
    }

    async fn get_photo(&self, photo_id: Uuid) -> PortResult<PhotoDetail> {
        let photo = self.fetch_photo(photo_id).await?;

        let comments = sqlx::query_as::<_, CommentRecord>(&format!(
            "{} WHERE c.photo_id = ? ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_SELECT
        ))
        .bind(photo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let reactions = sqlx::query_as::<_, ReactionRecord>(&format!(
            "{} WHERE photo_id = ? ORDER BY created_at ASC, id ASC",
            REACTION_SELECT
        ))
        .bind(photo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(PhotoDetail {
            photo,
            comments: comments.into_iter().map(|r| r.to_domain()).collect(),
            reactions: reactions.into_iter().map(|r| r.to_domain()).collect(),
        })
    }

    async fn list_photos(&self, query: &PhotoQuery) -> PortResult<Page<Photo>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(PHOTO_SELECT);
        qb.push(" WHERE 1 = 1");
        for predicate in &query.predicates {
            push_photo_predicate(&mut qb, predicate);
        }
        qb.push(format!(" ORDER BY {} DESC, p.id DESC", query.sort.column()));
        push_pagination(&mut qb, query.pagination);

        let records: Vec<PhotoRecord> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let photos = self.with_tags(records).await?;
        Ok(Page::from_fetch(photos, query.pagination))
    }

    async fn update_photo(&self, photo_id: Uuid, update: PhotoUpdate) -> PortResult<Photo> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let result = sqlx::query(
            "UPDATE photos SET caption = COALESCE(?, caption), taken_at = COALESCE(?, taken_at) \
             WHERE id = ?",
        )
        .bind(&update.caption)
        .bind(update.taken_at)
        .bind(photo_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Photo {} not found", photo_id)));
        }

        if let Some(loc) = update.location {
            sqlx::query("UPDATE photos SET latitude = ?, longitude = ?, altitude = ? WHERE id = ?")
                .bind(loc.latitude)
                .bind(loc.longitude)
                .bind(loc.altitude)
                .bind(photo_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        self.fetch_photo(photo_id).await
    }

    async fn add_photo_tags(&self, photo_id: Uuid, tags: &[String]) -> PortResult<Vec<String>> {
        self.ensure_target_exists(Target::Photo(photo_id)).await?;
        let tags = family_photos_core::query::normalize_tags(tags);

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        link_tags(&mut *tx, photo_id, &tags)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;

        self.photo_tags(photo_id).await
    }

    async fn remove_photo_tag(&self, photo_id: Uuid, tag: &str) -> PortResult<()> {
        let result = sqlx::query(
            "DELETE FROM photo_tags WHERE photo_id = ? \
             AND tag_id = (SELECT id FROM tags WHERE name = ?)",
        )
        .bind(photo_id)
        .bind(tag)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Tag '{}' not found on photo {}",
                tag, photo_id
            )));
        }
        Ok(())
    }

    async fn search_photos(&self, query: &SearchQuery) -> PortResult<Vec<Photo>> {
        let pattern = query.like_pattern();
        let sql = format!(
            r#"{} WHERE p.id IN (
                SELECT id FROM photos WHERE caption LIKE ? ESCAPE '\'
                UNION
                SELECT pt.photo_id FROM photo_tags pt JOIN tags t ON t.id = pt.tag_id
                    WHERE t.name LIKE ? ESCAPE '\'
                UNION
                SELECT ph.id FROM photos ph JOIN albums a ON a.id = ph.album_id
                    WHERE a.name LIKE ? ESCAPE '\'
            )
            ORDER BY p.uploaded_at DESC, p.id DESC
            LIMIT ?"#,
            PHOTO_SELECT
        );

        let records = sqlx::query_as::<_, PhotoRecord>(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        self.with_tags(records).await
    }

    async fn recent_activity(&self, days: u32, limit: u32) -> PortResult<RecentActivity> {
        let since = Utc::now() - chrono::Duration::days(i64::from(days));

        let photo_records = sqlx::query_as::<_, PhotoRecord>(&format!(
            "{} WHERE p.uploaded_at >= ? ORDER BY p.uploaded_at DESC, p.id DESC LIMIT ?",
            PHOTO_SELECT
        ))
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let comments = sqlx::query_as::<_, CommentRecord>(&format!(
            "{} WHERE c.created_at >= ? ORDER BY c.created_at DESC, c.id DESC LIMIT ?",
            COMMENT_SELECT
        ))
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(RecentActivity {
            days,
            photos: self.with_tags(photo_records).await?,
            comments: comments.into_iter().map(|r| r.to_domain()).collect(),
        })
    }

    async fn stats(&self, recent_since: DateTime<Utc>) -> PortResult<Stats> {
        // Independent reads; they may observe different snapshots under concurrent writes.
        let (total_photos, total_albums, total_users, recent_uploads, top_tags) = tokio::try_join!(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM photos").fetch_one(&self.pool),
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM albums").fetch_one(&self.pool),
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(&self.pool),
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM photos WHERE uploaded_at >= ?")
                .bind(recent_since)
                .fetch_one(&self.pool),
            sqlx::query_as::<_, (String, i64)>(
                "SELECT t.name, COUNT(*) AS uses FROM photo_tags pt JOIN tags t ON t.id = pt.tag_id \
                 GROUP BY t.id, t.name ORDER BY uses DESC, t.name ASC LIMIT ?",
            )
            .bind(TOP_TAG_COUNT)
            .fetch_all(&self.pool),
        )
        .map_err(unexpected)?;

        Ok(Stats {
            total_photos,
            total_albums,
            total_users,
            recent_uploads,
            top_tags: top_tags
                .into_iter()
                .map(|(name, count)| TagCount { name, count })
                .collect(),
        })
    }

    async fn add_comment(
        &self,
        target: Target,
        author_id: Uuid,
        content: &str,
    ) -> PortResult<Comment> {
        self.ensure_target_exists(target).await?;
        let id = Uuid::new_v4();
        let (photo_id, album_id) = target_columns(target);

        sqlx::query(
            "INSERT INTO comments (id, photo_id, album_id, author_id, content, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(photo_id)
        .bind(album_id)
        .bind(author_id)
        .bind(content)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        self.get_comment(id).await
    }

    async fn get_comment(&self, comment_id: Uuid) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(&format!("{} WHERE c.id = ?", COMMENT_SELECT))
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Comment {} not found", comment_id)))?;
        Ok(record.to_domain())
    }

    async fn list_comments(
        &self,
        target: Target,
        pagination: Pagination,
    ) -> PortResult<Page<Comment>> {
        self.ensure_target_exists(target).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(COMMENT_SELECT);
        match target {
            Target::Photo(id) => {
                qb.push(" WHERE c.photo_id = ");
                qb.push_bind(id);
            }
            Target::Album(id) => {
                qb.push(" WHERE c.album_id = ");
                qb.push_bind(id);
            }
        }
        qb.push(" ORDER BY c.created_at ASC, c.id ASC");
        push_pagination(&mut qb, pagination);

        let records: Vec<CommentRecord> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let comments = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(Page::from_fetch(comments, pagination))
    }

    async fn delete_comment(&self, comment_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Comment {} not found", comment_id)));
        }
        Ok(())
    }

    async fn add_reaction(
        &self,
        target: Target,
        author_id: Uuid,
        kind: &str,
    ) -> PortResult<Reaction> {
        self.ensure_target_exists(target).await?;
        let id = Uuid::new_v4();
        let (photo_id, album_id) = target_columns(target);

        sqlx::query(
            "INSERT INTO reactions (id, photo_id, album_id, author_id, kind, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(photo_id)
        .bind(album_id)
        .bind(author_id)
        .bind(kind)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        self.get_reaction(id).await
    }

    async fn get_reaction(&self, reaction_id: Uuid) -> PortResult<Reaction> {
        let record = sqlx::query_as::<_, ReactionRecord>(&format!("{} WHERE id = ?", REACTION_SELECT))
            .bind(reaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Reaction {} not found", reaction_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_reaction(&self, reaction_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM reactions WHERE id = ?")
            .bind(reaction_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Reaction {} not found", reaction_id)));
        }
        Ok(())
    }

    async fn toggle_album_reaction(
        &self,
        album_id: Uuid,
        author_id: Uuid,
        kind: &str,
    ) -> PortResult<bool> {
        self.ensure_target_exists(Target::Album(album_id)).await?;
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let removed = sqlx::query(
            "DELETE FROM reactions WHERE album_id = ? AND author_id = ? AND kind = ?",
        )
        .bind(album_id)
        .bind(author_id)
        .bind(kind)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?
        .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO reactions (id, photo_id, album_id, author_id, kind, created_at) \
                 VALUES (?, NULL, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(album_id)
            .bind(author_id)
            .bind(kind)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(removed == 0)
    }
}
