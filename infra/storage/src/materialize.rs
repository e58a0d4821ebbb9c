use crate::error::{StorageError, StorageErrorExt};
use crate::item::{ByteSource, ContentItem, DEFAULT_FILE_NAME, DEFAULT_MIME_TYPE};
use crate::reference::{self, sidecar_name};
use crate::security::is_blank;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Writes `item` into `dir`, either as a byte copy or, when `reference` is given, as an
/// external-reference sidecar, and returns the descriptor of what landed on disk.
///
/// The returned size is the number of bytes actually copied (inline mode) or the
/// declared size (reference mode). The mime type is never sniffed here.
///
/// # Errors
/// [`StorageError::Reference`] for a malformed reference, in which case nothing is
/// written; [`StorageError::Io`] when the file cannot be created, written, or synced;
/// errors from opening the item's byte source.
pub(crate) async fn materialize(
    item: &ContentItem,
    dir: &Path,
    reference: Option<&str>,
) -> Result<ContentItem, StorageError> {
    let filename =
        if is_blank(&item.filename) { DEFAULT_FILE_NAME.to_owned() } else { item.filename.clone() };
    let mime_type = item.mime_type.clone().unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned());

    let (size, source) = match reference {
        Some(reference) => {
            let source = reference::resolve(reference)?;
            let path = dir.join(sidecar_name(&filename));
            write_synced(&path, reference.as_bytes()).await?;
            debug!(path = %path.display(), reference, "External reference recorded");
            (item.size, source)
        },
        None => {
            let path = dir.join(&filename);
            let copied = copy_into(item, &path).await?;
            if copied != item.size {
                warn!(
                    id = %item.id,
                    declared = item.size,
                    copied,
                    "Declared content size differs from bytes written; keeping the observed size"
                );
            }
            (copied, ByteSource::File(path))
        },
    };

    Ok(ContentItem {
        id: item.id.clone(),
        qualifier: item.qualifier.clone(),
        filename,
        mime_type: Some(mime_type),
        size,
        source,
        metacard: item.metacard.clone(),
    })
}

async fn copy_into(item: &ContentItem, path: &Path) -> Result<u64, StorageError> {
    let mut reader = item.source.open().await?;
    let mut file = fs::File::create(path)
        .await
        .context(format!("Failed to create content file: {}", path.display()))?;

    let copied = tokio::io::copy(&mut reader, &mut file)
        .await
        .context(format!("Failed to copy content into {}", path.display()))?;
    file.flush().await.context("Flush failed")?;
    file.sync_all().await.context("Hardware sync failed")?;

    Ok(copied)
}

async fn write_synced(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut file = fs::File::create(path)
        .await
        .context(format!("Failed to create reference file: {}", path.display()))?;
    file.write_all(data).await.context("Write failed")?;
    file.sync_all().await.context("Hardware sync failed")?;
    Ok(())
}
