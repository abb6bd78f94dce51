//! services/api/src/adapters/media.rs
//!
//! Local-filesystem implementation of the `MediaStore` port. Files are written
//! under a root directory and served back by the web layer at `/media`.

use async_trait::async_trait;
use bytes::Bytes;
use family_photos_core::ports::{MediaStore, PortError, PortResult};
use std::path::PathBuf;
use tracing::debug;

/// Writes uploaded media to disk.
#[derive(Clone, Debug)]
pub struct LocalMediaStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, key: &str, data: Bytes) -> PortResult<String> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') {
            return Err(PortError::InvalidInput(format!("Invalid media key '{}'", key)));
        }

        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(format!("Failed to create media dir: {}", e)))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to write {}: {}", key, e)))?;

        debug!("Stored {} bytes at {}", data.len(), path.display());
        Ok(format!("{}/{}", self.url_prefix, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_writes_file_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/media/");

        let url = store
            .put("photos/abc.jpg", Bytes::from_static(b"jpeg bytes"))
            .await
            .unwrap();

        assert_eq!(url, "/media/photos/abc.jpg");
        let written = std::fs::read(dir.path().join("photos/abc.jpg")).unwrap();
        assert_eq!(written, b"jpeg bytes");
    }

    #[tokio::test]
    async fn put_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/media");

        let result = store.put("../escape.jpg", Bytes::new()).await;
        assert!(matches!(result, Err(PortError::InvalidInput(_))));
    }
}
