//! Per-request staging directories.
//!
//! Layout: `<store>/tmp/<request id>/<shard path>/<filename>`. A request's subtree
//! exists from its first staged item until commit or rollback removes it.

use crate::dirs;
use crate::error::{StorageError, StorageErrorExt};
use crate::item::ContentUri;
use crate::request::RequestId;
use crate::shard::shard_dir;
use std::path::{Path, PathBuf};
use std::io::ErrorKind;
use tokio::fs;
use tracing::debug;

pub const STAGING_DIR: &str = "tmp";

#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub(crate) const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn request_dir(&self, request_id: &RequestId) -> PathBuf {
        self.root.join(request_id.as_str())
    }

    #[must_use]
    pub fn item_dir(&self, request_id: &RequestId, uri: &ContentUri) -> PathBuf {
        shard_dir(&self.request_dir(request_id), uri)
    }

    /// Creates (if needed) and returns the staging directory for one item, emptied of
    /// any file staged earlier for the same slot. Subdirectories hold qualified slots and
    /// are left alone.
    ///
    /// # Errors
    /// [`StorageError::Io`] if any level of the directory cannot be created or a stale
    /// file cannot be removed.
    pub async fn stage_dir(
        &self,
        request_id: &RequestId,
        uri: &ContentUri,
    ) -> Result<PathBuf, StorageError> {
        let dir = self.item_dir(request_id, uri);
        fs::create_dir_all(&dir)
            .await
            .context(format!("Failed to create staging directory: {}", dir.display()))?;

        for stale in dirs::list_files(&dir).await? {
            match fs::remove_file(&stale).await {
                Ok(()) => debug!(request_id = %request_id, path = %stale.display(), "Restaged content replaced"),
                Err(err) if err.kind() == ErrorKind::NotFound => {},
                Err(err) => {
                    return Err(StorageError::Io {
                        source: err,
                        context: Some(format!("Failed to replace staged file: {}", stale.display()).into()),
                    });
                },
            }
        }
        Ok(dir)
    }

    /// Deletes the whole staging subtree of a request. A subtree that was never created
    /// or is already gone is not an error; returns whether anything was removed.
    ///
    /// # Errors
    /// [`StorageError::Io`] if the subtree exists but cannot be removed.
    pub async fn release(&self, request_id: &RequestId) -> Result<bool, StorageError> {
        let dir = self.request_dir(request_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(request_id = %request_id, path = %dir.display(), "Staging released");
                Ok(true)
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(
                    format!("Unable to remove temporary content storage for request: {request_id}")
                        .into(),
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(raw: &str) -> RequestId {
        RequestId::try_from(raw).unwrap()
    }

    #[tokio::test]
    async fn stage_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let staging = StagingArea::new(temp.path().join(STAGING_DIR));
        let uri = ContentUri::new("abc123", "thumb");

        let first = staging.stage_dir(&request("req-1"), &uri).await.unwrap();
        let second = staging.stage_dir(&request("req-1"), &uri).await.unwrap();

        assert_eq!(first, second);
        assert!(first.ends_with("req-1/abc/123/abc123/thumb"));
        assert!(first.is_dir());
    }

    #[tokio::test]
    async fn stage_dir_drops_earlier_files_but_keeps_qualified_slots() {
        let temp = TempDir::new().unwrap();
        let staging = StagingArea::new(temp.path().join(STAGING_DIR));
        let id = request("req-3");
        let primary = ContentUri::primary("abc123");

        let dir = staging.stage_dir(&id, &primary).await.unwrap();
        std::fs::write(dir.join("a.txt"), b"one").unwrap();
        let thumb = staging.stage_dir(&id, &ContentUri::new("abc123", "thumb")).await.unwrap();
        std::fs::write(thumb.join("t.png"), b"png").unwrap();

        let again = staging.stage_dir(&id, &primary).await.unwrap();

        assert!(!again.join("a.txt").exists());
        assert!(thumb.join("t.png").is_file());
    }

    #[tokio::test]
    async fn release_tolerates_missing_subtree() {
        let temp = TempDir::new().unwrap();
        let staging = StagingArea::new(temp.path().join(STAGING_DIR));
        let id = request("req-2");

        assert!(!staging.release(&id).await.unwrap());

        staging.stage_dir(&id, &ContentUri::primary("abc123")).await.unwrap();
        assert!(staging.release(&id).await.unwrap());
        assert!(!staging.request_dir(&id).exists());
        assert!(!staging.release(&id).await.unwrap());
    }
}
