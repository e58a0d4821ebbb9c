//! Mime type detection used when reading content back.
//!
//! The store never sniffs on write; the [`MimeTypeMapper`] runs at read time against the
//! leading bytes and extension of the stored file, with [`probe_content_type`] as the
//! filesystem-level fallback.

use crate::item::DEFAULT_MIME_TYPE;
use std::fmt::Debug;
use std::path::Path;

/// Number of leading bytes handed to a [`MimeTypeMapper`].
pub const SNIFF_LEN: u64 = 512;

/// Resolves a mime type from leading content bytes and a file extension.
pub trait MimeTypeMapper: Debug + Send + Sync + 'static {
    /// `extension` has no leading dot and may be empty.
    fn guess_mime_type(&self, head: &[u8], extension: &str) -> Option<String>;
}

/// Magic-number sniffing followed by an extension lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMimeTypeMapper;

impl MimeTypeMapper for DefaultMimeTypeMapper {
    fn guess_mime_type(&self, head: &[u8], extension: &str) -> Option<String> {
        sniff(head).or_else(|| for_extension(extension)).map(str::to_owned)
    }
}

const MAGIC: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B", "application/gzip"),
    (b"<?xml", "application/xml"),
];

const EXTENSIONS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("text", "text/plain"),
    ("log", "text/plain"),
    ("csv", "text/csv"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("geojson", "application/geo+json"),
    ("kml", "application/vnd.google-earth.kml+xml"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("nitf", "image/nitf"),
    ("ntf", "image/nitf"),
    ("mp4", "video/mp4"),
    ("mpg", "video/mpeg"),
    ("mpeg", "video/mpeg"),
];

fn sniff(head: &[u8]) -> Option<&'static str> {
    MAGIC.iter().find(|(magic, _)| head.starts_with(magic)).map(|(_, mime)| *mime)
}

fn for_extension(extension: &str) -> Option<&'static str> {
    EXTENSIONS
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|(_, mime)| *mime)
}

/// Filesystem-level content type lookup for a local file, based on its extension.
#[must_use]
pub fn probe_content_type(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).and_then(for_extension).map(str::to_owned)
}

/// Whether a resolved type is missing or only the generic fallback.
pub(crate) fn is_unresolved(mime: Option<&str>) -> bool {
    mime.is_none_or(|m| m == DEFAULT_MIME_TYPE)
}
