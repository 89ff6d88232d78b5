//! Employee avatar files on local disk.
//!
//! Files live at `<upload_dir>/avatars/<employee_id>.<ext>`; the path stored
//! on the employee is relative to `upload_dir`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Supported image formats
pub const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];

const AVATAR_SUBDIR: &str = "avatars";

#[derive(Debug, Clone)]
pub struct AvatarStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl AvatarStorage {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn avatar_dir(&self) -> PathBuf {
        self.root.join(AVATAR_SUBDIR)
    }

    /// Lowercased extension of `filename` when it is an accepted image type.
    pub fn extension_of(filename: &str) -> Result<String, ServiceError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Invalid file extension for: {}", filename))
            })?;

        if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
            return Err(ServiceError::ValidationError(format!(
                "Unsupported file format '{}'. Supported: {}",
                ext,
                SUPPORTED_FORMATS.join(", ")
            )));
        }
        Ok(ext)
    }

    pub fn validate(&self, filename: &str, data: &[u8]) -> Result<String, ServiceError> {
        if data.is_empty() {
            return Err(ServiceError::ValidationError(
                "Empty file provided".to_string(),
            ));
        }
        if data.len() > self.max_bytes {
            return Err(ServiceError::ValidationError(format!(
                "File too large. Maximum size is {} bytes",
                self.max_bytes
            )));
        }
        Self::extension_of(filename)
    }

    /// Writes the avatar and returns its path relative to the upload root.
    /// A previous avatar under another extension is removed.
    pub async fn store(
        &self,
        employee_id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> Result<String, ServiceError> {
        let ext = self.validate(filename, data)?;
        let dir = self.avatar_dir();
        tokio::fs::create_dir_all(&dir).await?;

        for other in SUPPORTED_FORMATS.iter().filter(|f| **f != ext) {
            let stale = dir.join(format!("{}.{}", employee_id, other));
            if tokio::fs::try_exists(&stale).await.unwrap_or(false) {
                debug!(path = %stale.display(), "Removing previous avatar");
                tokio::fs::remove_file(&stale).await?;
            }
        }

        let file_name = format!("{}.{}", employee_id, ext);
        tokio::fs::write(dir.join(&file_name), data).await?;

        let relative = format!("{}/{}", AVATAR_SUBDIR, file_name);
        info!(%employee_id, path = %relative, bytes = data.len(), "Avatar stored");
        Ok(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("me.png", "png")]
    #[case("ME.JPG", "jpg")]
    #[case("photo.final.jpeg", "jpeg")]
    #[case("a.webp", "webp")]
    fn accepted_extensions(#[case] filename: &str, #[case] expected: &str) {
        assert_eq!(AvatarStorage::extension_of(filename).unwrap(), expected);
    }

    #[rstest]
    #[case("notes.txt")]
    #[case("script.svg")]
    #[case("no_extension")]
    fn rejected_extensions(#[case] filename: &str) {
        assert_matches!(
            AvatarStorage::extension_of(filename),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn oversized_and_empty_files_are_rejected() {
        let storage = AvatarStorage::new("unused", 4);
        assert_matches!(
            storage.validate("a.png", &[0u8; 5]),
            Err(ServiceError::ValidationError(msg)) if msg.contains("too large")
        );
        assert_matches!(
            storage.validate("a.png", &[]),
            Err(ServiceError::ValidationError(_))
        );
        assert!(storage.validate("a.png", &[0u8; 4]).is_ok());
    }

    #[tokio::test]
    async fn store_writes_file_and_replaces_other_extension() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AvatarStorage::new(dir.path(), 1024);
        let id = Uuid::new_v4();

        let first = storage.store(id, "me.png", b"png-bytes").await.unwrap();
        assert_eq!(first, format!("avatars/{}.png", id));
        assert!(dir.path().join(&first).exists());

        let second = storage.store(id, "me.jpg", b"jpg-bytes").await.unwrap();
        assert_eq!(second, format!("avatars/{}.jpg", id));
        assert!(!dir.path().join(&first).exists());
        assert_eq!(
            std::fs::read(dir.path().join(&second)).unwrap(),
            b"jpg-bytes".to_vec()
        );
    }
}
