//! Filesystem storage for uploaded post images.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("no stored file at this path")]
    Missing,
}

/// Result of storing an upload payload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Path relative to the storage root, e.g. `posts/<uuid>-cat.gif`.
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: u64,
}

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

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` below `directory`, naming the file after `original_name`
    /// with the detected `extension`.
    pub async fn store(
        &self,
        directory: &str,
        original_name: &str,
        extension: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let stored_path = build_stored_path(directory, original_name, extension);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(&data));

        Ok(StoredUpload {
            stored_path,
            checksum,
            size_bytes: data.len() as u64,
        })
    }

    /// Read a stored file. Directories and absent paths are both `Missing`.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::metadata(&absolute).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(UploadStorageError::Missing),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadStorageError::Missing);
            }
            Err(err) => return Err(UploadStorageError::Io(err)),
        }
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

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

fn build_stored_path(directory: &str, original_name: &str, extension: &str) -> String {
    let identifier = Uuid::new_v4().simple();
    let stem = sanitize_stem(original_name);
    let directory = directory.trim_matches('/');
    format!("{directory}/{identifier}-{stem}.{extension}")
}

fn sanitize_stem(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let base = slugify(stem);
    if base.is_empty() {
        "image".to_string()
    } else {
        base.chars().take(64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_path_lives_under_directory() {
        let path = build_stored_path("posts", "Small Cat.GIF", "gif");
        assert!(path.starts_with("posts/"));
        assert!(path.ends_with("-small-cat.gif"));
    }

    #[test]
    fn stem_falls_back_for_unrepresentable_names() {
        assert_eq!(sanitize_stem("???.png"), "image");
        assert_eq!(sanitize_stem(""), "image");
    }

    #[tokio::test]
    async fn store_read_delete_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        let stored = storage
            .store("posts", "a.gif", "gif", Bytes::from_static(b"GIF89a"))
            .await
            .expect("store");
        assert_eq!(stored.size_bytes, 6);
        assert_eq!(storage.read(&stored.stored_path).await.unwrap(), "GIF89a");

        storage.delete(&stored.stored_path).await.expect("delete");
        storage.delete(&stored.stored_path).await.expect("idempotent");
        assert!(matches!(
            storage.read(&stored.stored_path).await,
            Err(UploadStorageError::Missing)
        ));
    }

    #[tokio::test]
    async fn directories_are_not_stored_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");
        std::fs::create_dir_all(dir.path().join("posts")).expect("posts dir");

        for path in ["posts", "posts/"] {
            assert!(matches!(
                storage.read(path).await,
                Err(UploadStorageError::Missing)
            ));
        }
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");
        for path in ["../etc/passwd", "/etc/passwd", "posts/../../x", ""] {
            assert!(matches!(
                storage.read(path).await,
                Err(UploadStorageError::InvalidPath)
            ));
        }
    }
}
