//! External-reference sidecars.
//!
//! An item stored by reference is represented on disk by `<filename>.external-reference`,
//! whose content is the raw reference URI (UTF-8, no trailing delimiter).

use crate::error::StorageError;
use crate::item::ByteSource;
use std::path::{Path, PathBuf};
use url::Url;

pub const REFERENCE_EXTENSION: &str = "external-reference";

pub(crate) fn sidecar_name(filename: &str) -> String {
    format!("{filename}.{REFERENCE_EXTENSION}")
}

pub(crate) fn is_sidecar(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(REFERENCE_EXTENSION)
}

/// Turns a stored reference into a byte source.
///
/// Scheme-less references and `file:` URLs resolve to a local path; every other scheme
/// becomes a lazily opened remote source.
pub(crate) fn resolve(reference: &str) -> Result<ByteSource, StorageError> {
    match Url::parse(reference) {
        Ok(url) if url.scheme().eq_ignore_ascii_case("file") => {
            let path = url.to_file_path().map_err(|()| StorageError::Validation {
                message: reference.to_owned().into(),
                context: Some("file: reference is not a local path".into()),
            })?;
            Ok(ByteSource::File(path))
        },
        // Single-letter schemes are Windows drive letters, not URLs.
        Ok(url) if url.scheme().len() == 1 => Ok(ByteSource::File(PathBuf::from(reference))),
        Ok(url) => Ok(ByteSource::Remote(url)),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Ok(ByteSource::File(PathBuf::from(reference)))
        },
        Err(err) => Err(StorageError::Reference {
            source: err,
            context: Some(format!("Reference: {reference}").into()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_naming() {
        assert_eq!(sidecar_name("doc.txt"), "doc.txt.external-reference");
        assert!(is_sidecar(Path::new("/x/doc.txt.external-reference")));
        assert!(!is_sidecar(Path::new("/x/doc.txt")));
    }

    #[test]
    fn resolves_local_and_remote_references() {
        assert!(matches!(
            resolve("/data/archive/doc.txt").unwrap(),
            ByteSource::File(p) if p == Path::new("/data/archive/doc.txt")
        ));
        assert!(matches!(
            resolve("file:///data/archive/doc.txt").unwrap(),
            ByteSource::File(p) if p == Path::new("/data/archive/doc.txt")
        ));
        assert!(matches!(
            resolve("https://example.org/doc.txt").unwrap(),
            ByteSource::Remote(u) if u.host_str() == Some("example.org")
        ));
    }
}
