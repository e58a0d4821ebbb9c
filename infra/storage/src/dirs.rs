//! Small async directory helpers shared by the reader, publisher, and engine.

use crate::error::{StorageError, StorageErrorExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Lists the direct entries of `dir`, sorted by path. A missing directory yields an
/// empty list.
pub(crate) async fn list_entries(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let mut reader = match fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(StorageError::Io {
                source: err,
                context: Some(format!("Failed to list {}", dir.display()).into()),
            });
        },
    };

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .context(format!("Failed to list {}", dir.display()))?
    {
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Direct entries of `dir` that are not directories.
pub(crate) async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let mut files = Vec::new();
    for path in list_entries(dir).await? {
        let meta = fs::metadata(&path)
            .await
            .context(format!("Failed to stat {}", path.display()))?;
        if !meta.is_dir() {
            files.push(path);
        }
    }
    Ok(files)
}

pub(crate) async fn exists(path: &Path) -> Result<bool, StorageError> {
    fs::try_exists(path).await.context(format!("Failed to probe {}", path.display()))
}

/// Whether `dir` exists and holds at least one entry.
pub(crate) async fn has_entries(dir: &Path) -> Result<bool, StorageError> {
    Ok(!list_entries(dir).await?.is_empty())
}
