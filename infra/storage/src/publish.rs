//! Commit-time moves from staging into the permanent store, and permanent deletes.

use crate::dirs;
use crate::error::{StorageError, StorageErrorExt};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Shard levels above an id directory that may be pruned once empty.
const PRUNE_DEPTH: usize = 2;

/// Moves a staged item directory onto its permanent location, replacing whatever files
/// the target held. Nothing staged means nothing to do.
///
/// Falls back to copying every staged file when the directory rename is refused
/// (cross-device store, or a target that still holds qualifier subdirectories).
pub(crate) async fn publish_move(staged: &Path, target: &Path) -> Result<(), StorageError> {
    if !dirs::exists(staged).await? {
        debug!(path = %staged.display(), "Nothing staged, skipping publish");
        return Ok(());
    }

    for old in dirs::list_files(target).await? {
        match fs::remove_file(&old).await {
            Ok(()) => debug!(path = %old.display(), "Replaced content removed"),
            Err(err) if err.kind() == ErrorKind::NotFound => {},
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to replace {}", old.display()).into()),
                });
            },
        }
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .context(format!("Failed to create shards for {}", target.display()))?;
    }

    match fs::rename(staged, target).await {
        Ok(()) => {
            debug!(from = %staged.display(), to = %target.display(), "Content published");
            Ok(())
        },
        Err(err) => {
            warn!(
                from = %staged.display(),
                to = %target.display(),
                error = %err,
                "Rename refused, copying staged files instead"
            );
            copy_files(staged, target).await
        },
    }
}

async fn copy_files(staged: &Path, target: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(target)
        .await
        .context(format!("Failed to create {}", target.display()))?;

    for file in dirs::list_files(staged).await? {
        let Some(name) = file.file_name() else { continue };
        let dest = target.join(name);
        fs::copy(&file, &dest).await.context(format!(
            "Copy failed: {} -> {}",
            file.display(),
            dest.display()
        ))?;
    }
    Ok(())
}

/// Removes a permanent id directory, then prunes its two shard ancestors if they were
/// left empty. The directory must still exist.
pub(crate) async fn publish_delete(dir: &Path) -> Result<(), StorageError> {
    if !dirs::exists(dir).await? {
        return Err(StorageError::Corruption {
            message: dir.display().to_string().into(),
            context: Some("Content scheduled for deletion is missing".into()),
        });
    }

    fs::remove_dir_all(dir).await.context(format!("Failed to delete {}", dir.display()))?;
    debug!(path = %dir.display(), "Content deleted");

    for ancestor in dir.ancestors().skip(1).take(PRUNE_DEPTH) {
        if !prune_if_empty(ancestor).await {
            break;
        }
    }
    Ok(())
}

async fn prune_if_empty(dir: &Path) -> bool {
    match fs::remove_dir(dir).await {
        Ok(()) => {
            debug!(path = %dir.display(), "Empty shard pruned");
            true
        },
        Err(err) if matches!(err.kind(), ErrorKind::DirectoryNotEmpty | ErrorKind::NotFound) => {
            false
        },
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "Shard prune failed");
            false
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn move_replaces_existing_files() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("tmp/req-1/abc/123/abc123");
        let target = temp.path().join("abc/123/abc123");
        std::fs::create_dir_all(&staged).unwrap();
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(staged.join("new.txt"), b"new").unwrap();
        std::fs::write(target.join("old.txt"), b"old").unwrap();

        publish_move(&staged, &target).await.unwrap();

        assert!(!target.join("old.txt").exists());
        assert_eq!(std::fs::read(target.join("new.txt")).unwrap(), b"new");
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn move_copies_when_target_keeps_subdirectories() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged");
        let target = temp.path().join("abc/123/abc123");
        std::fs::create_dir_all(&staged).unwrap();
        std::fs::create_dir_all(target.join("thumb")).unwrap();
        std::fs::write(staged.join("one.bin"), b"1").unwrap();
        std::fs::write(staged.join("two.bin"), b"2").unwrap();

        publish_move(&staged, &target).await.unwrap();

        assert_eq!(std::fs::read(target.join("one.bin")).unwrap(), b"1");
        assert_eq!(std::fs::read(target.join("two.bin")).unwrap(), b"2");
        assert!(target.join("thumb").is_dir());
    }

    #[tokio::test]
    async fn move_without_staged_dir_is_noop() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("abc/123/abc123");

        publish_move(&temp.path().join("missing"), &target).await.unwrap();

        assert!(!target.exists());
    }

    #[tokio::test]
    async fn delete_prunes_two_empty_levels_only() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        let dir = root.join("abc/123/abc123");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("doc.txt"), b"x").unwrap();

        publish_delete(&dir).await.unwrap();

        assert!(!root.join("abc").exists());
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn delete_keeps_populated_ancestors() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("abc/123/abc123");
        let sibling = temp.path().join("abc/123/abc123zz");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::create_dir_all(&sibling).unwrap();

        publish_delete(&dir).await.unwrap();

        assert!(!dir.exists());
        assert!(sibling.is_dir());
    }

    #[tokio::test]
    async fn delete_of_missing_dir_is_corruption() {
        let temp = TempDir::new().unwrap();
        let err = publish_delete(&temp.path().join("abc/123/abc123")).await.unwrap_err();
        assert!(err.is_corruption());
    }
}
