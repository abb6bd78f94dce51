//! services/api/src/web/uploads.rs
//!
//! Batch photo uploads. Every file is stored and recorded on its own; a
//! failure leaves the rest of the batch in place and is only reported back.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bytes::Bytes;
use family_photos_core::domain::{NewPhoto, Photo};
use family_photos_core::ports::{DatabaseService, MediaStore, PortError, PortResult};
use family_photos_core::query::parse_tag_list;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::web::state::{AppState, CurrentUser};
use crate::web::{reject, Rejection};

/// One file part of an upload request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Settings shared by every file in a batch.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub uploaded_by: Uuid,
    pub album_id: Option<Uuid>,
    pub caption: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailure {
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub album_id: Option<Uuid>,
    pub succeeded: usize,
    pub failed: usize,
    pub photos: Vec<Photo>,
    pub errors: Vec<UploadFailure>,
}

/// Raster formats accepted for upload, keyed by content type.
const RASTER_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
];

/// Stored extension for `file`, taken from its declared content type and never
/// from the client's file name.
fn extension_for(file: &UploadedFile) -> PortResult<&'static str> {
    let content_type = file
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .unwrap_or_default();
    RASTER_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            PortError::InvalidInput(format!(
                "{} is not a supported image (jpeg, png, gif, webp or heic)",
                file.file_name
            ))
        })
}

async fn store_one(
    db: &dyn DatabaseService,
    media: &dyn MediaStore,
    file: UploadedFile,
    options: &UploadOptions,
) -> PortResult<Photo> {
    let extension = extension_for(&file)?;
    if file.data.is_empty() {
        return Err(PortError::InvalidInput(format!("{} is empty", file.file_name)));
    }

    let id = Uuid::new_v4();
    let key = format!("{}.{}", id, extension);
    let url = media.put(&key, file.data).await?;
    db.create_photo(NewPhoto {
        id,
        thumbnail_url: url.clone(),
        url,
        caption: options.caption.clone(),
        uploaded_by: options.uploaded_by,
        album_id: options.album_id,
        taken_at: None,
        location: None,
        tags: options.tags.clone(),
    })
    .await
    .map_err(|e| {
        warn!(key = %key, "Photo row not created, media file left orphaned: {:?}", e);
        e
    })
}

/// Stores every file concurrently. Nothing is rolled back when some fail.
pub async fn store_batch(
    db: &dyn DatabaseService,
    media: &dyn MediaStore,
    files: Vec<UploadedFile>,
    options: &UploadOptions,
) -> UploadReport {
    let attempts = files.into_iter().map(|file| async move {
        let file_name = file.file_name.clone();
        (file_name, store_one(db, media, file, options).await)
    });

    let mut report = UploadReport {
        album_id: options.album_id,
        succeeded: 0,
        failed: 0,
        photos: Vec::new(),
        errors: Vec::new(),
    };
    for (file_name, outcome) in join_all(attempts).await {
        match outcome {
            Ok(photo) => {
                report.succeeded += 1;
                report.photos.push(photo);
            }
            Err(e) => {
                warn!(%file_name, "Upload failed: {}", e);
                report.failed += 1;
                report.errors.push(UploadFailure {
                    file_name,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        album_id = ?report.album_id,
        "Upload batch finished"
    );
    report
}

fn bad_multipart(e: impl std::fmt::Display) -> Rejection {
    (
        StatusCode::BAD_REQUEST,
        format!("Failed to read multipart data: {}", e),
    )
}

/// POST /uploads - Upload one or more photos
///
/// Multipart parts: `file` (repeatable), optional `albumName` or `albumId`,
/// `caption` and comma-separated `tags`.
#[utoipa::path(
    post,
    path = "/uploads",
    request_body(content_type = "multipart/form-data", description = "Photo files and batch metadata"),
    responses(
        (status = 200, description = "Per-file outcome of the batch"),
        (status = 400, description = "No files in the request"),
        (status = 404, description = "Album not found")
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, Rejection> {
    let mut files = Vec::new();
    let mut album_name: Option<String> = None;
    let mut album_id: Option<Uuid> = None;
    let mut options = UploadOptions {
        uploaded_by: user.id,
        ..Default::default()
    };

    // 1. Read every part before touching storage
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "files" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(bad_multipart)?;
                files.push(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            "albumName" => {
                let text = field.text().await.map_err(bad_multipart)?;
                album_name = Some(text.trim().to_string()).filter(|n| !n.is_empty());
            }
            "albumId" => {
                let text = field.text().await.map_err(bad_multipart)?;
                let id = Uuid::parse_str(text.trim())
                    .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid albumId".to_string()))?;
                album_id = Some(id);
            }
            "caption" => {
                let text = field.text().await.map_err(bad_multipart)?;
                options.caption = Some(text.trim().to_string()).filter(|c| !c.is_empty());
            }
            "tags" => {
                let text = field.text().await.map_err(bad_multipart)?;
                options.tags = parse_tag_list(&text);
            }
            other => warn!(field = other, "Ignoring unknown upload field"),
        }
    }

    if files.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include at least one file".to_string(),
        ));
    }

    // 2. Resolve the album the batch belongs to
    options.album_id = match (album_id, album_name) {
        (Some(id), _) => Some(state.db.get_album(id).await.map_err(reject)?.id),
        (None, Some(name)) => Some(state.db.create_album(&name, user.id).await.map_err(reject)?.id),
        (None, None) => None,
    };

    // 3. Store the files
    let report = store_batch(state.db.as_ref(), state.media.as_ref(), files, &options).await;
    Ok((StatusCode::OK, Json(report)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content_type: Option<&str>) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: content_type.map(str::to_string),
            data: Bytes::from_static(b"img"),
        }
    }

    #[test]
    fn extension_follows_the_content_type() {
        assert_eq!(extension_for(&file("Beach.JPG", Some("image/jpeg"))).unwrap(), "jpg");
        assert_eq!(extension_for(&file("beach", Some("image/png"))).unwrap(), "png");
        assert_eq!(extension_for(&file("x.html", Some("image/png"))).unwrap(), "png");
        assert_eq!(extension_for(&file("pic.png", Some("image/jpeg"))).unwrap(), "jpg");
        assert_eq!(extension_for(&file("IMG_1.HEIC", Some("Image/HEIC"))).unwrap(), "heic");
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(extension_for(&file("notes.txt", Some("text/plain"))).is_err());
        assert!(extension_for(&file("mystery.jpg", None)).is_err());
        assert!(extension_for(&file("logo.svg", Some("image/svg+xml"))).is_err());
        assert!(extension_for(&file("page.html", Some("text/html"))).is_err());
        assert!(extension_for(&file("x.bmp", Some("image/x-ms-bmp"))).is_err());
    }
}
