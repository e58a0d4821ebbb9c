use crate::dirs;
use crate::error::{StorageError, StorageErrorExt};
use crate::item::{ByteSource, ContentItem, ContentUri, DEFAULT_MIME_TYPE};
use crate::mime::{MimeTypeMapper, SNIFF_LEN, is_unresolved, probe_content_type};
use crate::reference::{self, REFERENCE_EXTENSION};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Locates the single content file stored in `dir` for `uri`.
///
/// Returns `Ok(None)` when nothing was ever stored there. A slot holding zero or several
/// files is a [`StorageError::Corruption`]; a sidecar pointing at a missing local file is
/// [`StorageError::NotFound`].
pub(crate) async fn read_content(
    dir: &Path,
    uri: &ContentUri,
    mime: &dyn MimeTypeMapper,
) -> Result<Option<ContentItem>, StorageError> {
    if !dirs::exists(dir).await? {
        return Ok(None);
    }

    let files = dirs::list_files(dir).await?;
    let [file] = files.as_slice() else {
        return Err(StorageError::Corruption {
            message: uri.to_string().into(),
            context: Some(
                format!("Expected exactly one file in {}, found {}", dir.display(), files.len())
                    .into(),
            ),
        });
    };

    let stored_name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();

    let (filename, source) = if reference::is_sidecar(file) {
        let target = fs::read_to_string(file)
            .await
            .context(format!("Failed to read reference {}", file.display()))?;
        let source = reference::resolve(&target)?;
        if let Some(path) = source.local_path()
            && !dirs::exists(path).await?
        {
            return Err(StorageError::NotFound {
                message: uri.to_string().into(),
                context: Some(format!("Referenced file is gone: {}", path.display()).into()),
            });
        }
        debug!(uri = %uri, reference = %target, "Resolved external reference");
        let filename = stored_name
            .strip_suffix(REFERENCE_EXTENSION)
            .and_then(|n| n.strip_suffix('.'))
            .unwrap_or(stored_name);
        (filename.to_owned(), source)
    } else {
        (stored_name.to_owned(), ByteSource::File(file.clone()))
    };

    let (size, mime_type) = match source.local_path() {
        Some(path) => {
            let size = fs::metadata(path)
                .await
                .context(format!("Failed to stat {}", path.display()))?
                .len();
            (size, resolve_local_mime(path, &filename, mime).await?)
        },
        // Remote bytes are neither fetched nor sized until opened.
        None => (0, mime.guess_mime_type(&[], extension(&filename))),
    };

    Ok(Some(ContentItem {
        id: uri.id().to_owned(),
        qualifier: uri.qualifier().to_owned(),
        filename,
        mime_type: Some(mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned())),
        size,
        source,
        metacard: None,
    }))
}

async fn resolve_local_mime(
    path: &Path,
    filename: &str,
    mime: &dyn MimeTypeMapper,
) -> Result<Option<String>, StorageError> {
    let head = read_head(path).await?;
    let sniffed = mime.guess_mime_type(&head, extension(filename));
    if !is_unresolved(sniffed.as_deref()) {
        return Ok(sniffed);
    }
    Ok(probe_content_type(path).or_else(|| probe_content_type(Path::new(filename))).or(sniffed))
}

async fn read_head(path: &Path) -> Result<Vec<u8>, StorageError> {
    let file =
        fs::File::open(path).await.context(format!("Failed to open {}", path.display()))?;
    let mut head = Vec::with_capacity(512);
    file.take(SNIFF_LEN)
        .read_to_end(&mut head)
        .await
        .context(format!("Failed to read {}", path.display()))?;
    Ok(head)
}

fn extension(filename: &str) -> &str {
    Path::new(filename).extension().and_then(|e| e.to_str()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::DefaultMimeTypeMapper;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_slot_is_none() {
        let temp = TempDir::new().unwrap();
        let found = read_content(
            &temp.path().join("abc"),
            &ContentUri::primary("abc123"),
            &DefaultMimeTypeMapper,
        )
        .await
        .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn two_files_is_corruption() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"a").unwrap();
        std::fs::write(temp.path().join("b.txt"), b"b").unwrap();

        let err = read_content(temp.path(), &ContentUri::primary("abc123"), &DefaultMimeTypeMapper)
            .await
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[tokio::test]
    async fn empty_slot_is_corruption() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("thumb")).unwrap();

        let err = read_content(temp.path(), &ContentUri::primary("abc123"), &DefaultMimeTypeMapper)
            .await
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[tokio::test]
    async fn sniffs_mime_from_leading_bytes() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("scan.bin"), b"%PDF-1.4 body").unwrap();

        let item = read_content(temp.path(), &ContentUri::primary("abc123"), &DefaultMimeTypeMapper)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.mime_type(), "application/pdf");
        assert_eq!(item.size(), 13);
        assert_eq!(item.filename(), "scan.bin");
    }

    #[tokio::test]
    async fn sidecar_resolves_to_referenced_file() {
        let temp = TempDir::new().unwrap();
        let archived = temp.path().join("archived.txt");
        std::fs::write(&archived, b"archived bytes").unwrap();
        let slot = temp.path().join("slot");
        std::fs::create_dir(&slot).unwrap();
        std::fs::write(
            slot.join("report.txt.external-reference"),
            archived.display().to_string(),
        )
        .unwrap();

        let item = read_content(&slot, &ContentUri::primary("abc123"), &DefaultMimeTypeMapper)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.filename(), "report.txt");
        assert_eq!(item.size(), 14);
        assert_eq!(item.mime_type(), "text/plain");
        assert_eq!(item.read_all().await.unwrap(), b"archived bytes");
    }

    #[tokio::test]
    async fn dangling_local_reference_is_not_found() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("gone.txt.external-reference"),
            temp.path().join("missing.txt").display().to_string(),
        )
        .unwrap();

        let err = read_content(temp.path(), &ContentUri::primary("abc123"), &DefaultMimeTypeMapper)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
