//! Filesystem storage for post images.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use slug::slugify;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

/// Result of storing an upload payload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stored_path: String,
    pub size_bytes: i64,
}

/// Filesystem-backed upload storage.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store the provided payload under `posts/` and return its stored path.
    pub async fn store(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let stored_path = build_stored_path(original_name);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let size_bytes = data.len() as i64;
        fs::write(&absolute, &data).await?;

        Ok(StoredUpload {
            stored_path,
            size_bytes,
        })
    }

    /// Read a stored payload into memory.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    /// Resolve the absolute filesystem path for a stored upload, rejecting
    /// anything that would escape the storage root.
    pub fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

fn build_stored_path(original_name: &str) -> String {
    let identifier = Uuid::new_v4();
    let filename = sanitize_filename(original_name);
    format!("posts/{identifier}-{filename}")
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_extension() {
        assert_eq!(sanitize_filename("My Cat Photo.PNG"), "my-cat-photo.png");
    }

    #[test]
    fn sanitize_handles_empty_stem() {
        assert_eq!(sanitize_filename("....jpg"), "upload.jpg");
    }

    #[test]
    fn stored_paths_live_under_posts() {
        assert!(build_stored_path("cat.png").starts_with("posts/"));
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = std::env::temp_dir().join(format!("yatube-uploads-{}", Uuid::new_v4()));
        let storage = UploadStorage::new(dir.clone()).unwrap();

        assert!(matches!(
            storage.resolve("../etc/passwd"),
            Err(UploadStorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.resolve("/etc/passwd"),
            Err(UploadStorageError::InvalidPath)
        ));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn store_then_read_round_trips() {
        let dir = std::env::temp_dir().join(format!("yatube-uploads-{}", Uuid::new_v4()));
        let storage = UploadStorage::new(dir.clone()).unwrap();

        let stored = storage
            .store("cat.png", Bytes::from_static(b"binary image data"))
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 17);

        let data = storage.read(&stored.stored_path).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"binary image data"));

        storage.delete(&stored.stored_path).await.unwrap();
        assert!(storage.read(&stored.stored_path).await.is_err());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let dir = std::env::temp_dir().join(format!("yatube-uploads-{}", Uuid::new_v4()));
        let storage = UploadStorage::new(dir.clone()).unwrap();

        assert!(matches!(
            storage.store("cat.png", Bytes::new()).await,
            Err(UploadStorageError::EmptyPayload)
        ));

        let _ = std::fs::remove_dir_all(dir);
    }
}
