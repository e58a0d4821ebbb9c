//! Content item descriptors and the byte sources behind them.

use crate::error::{StorageError, StorageErrorExt};
use crate::security::{is_blank, validate_segment};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use url::Url;

/// URI scheme of stored content (`content:<id>[#<qualifier>]`).
pub const CONTENT_SCHEME: &str = "content";
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
/// Filename given to items that arrive without one.
pub const DEFAULT_FILE_NAME: &str = "content_store_file.bin";

/// Address of one content slot: an owning id plus an optional qualifier
/// (empty for the primary item).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentUri {
    id: String,
    qualifier: String,
}

impl ContentUri {
    #[must_use]
    pub fn new(id: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self { id: id.into(), qualifier: qualifier.into() }
    }

    #[must_use]
    pub fn primary(id: impl Into<String>) -> Self {
        Self::new(id, "")
    }

    /// Parses `content:<id>` or `content:<id>#<qualifier>`.
    ///
    /// # Errors
    /// Returns [`StorageError::Validation`] for another scheme or a blank id.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let rest = raw
            .strip_prefix(CONTENT_SCHEME)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| StorageError::Validation {
                message: raw.to_owned().into(),
                context: Some(format!("Expected a `{CONTENT_SCHEME}:` URI").into()),
            })?;

        let (id, qualifier) = rest.split_once('#').unwrap_or((rest, ""));
        if is_blank(id) {
            return Err(StorageError::Validation {
                message: raw.to_owned().into(),
                context: Some("Content URI has no id".into()),
            });
        }

        Ok(Self::new(id, qualifier))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    #[must_use]
    pub fn is_primary(&self) -> bool {
        is_blank(&self.qualifier)
    }
}

impl fmt::Display for ContentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_primary() {
            write!(f, "{CONTENT_SCHEME}:{}", self.id)
        } else {
            write!(f, "{CONTENT_SCHEME}:{}#{}", self.id, self.qualifier)
        }
    }
}

impl FromStr for ContentUri {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The slice of a catalog record the store reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metacard {
    pub id: String,
    pub resource_uri: Option<String>,
    pub resource_size: Option<u64>,
}

impl Metacard {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }
}

/// A re-openable handle to the bytes of a content item.
#[derive(Debug, Clone, Default)]
pub enum ByteSource {
    #[default]
    Empty,
    Memory(Arc<[u8]>),
    File(PathBuf),
    /// Externally hosted bytes, fetched only when opened.
    Remote(Url),
}

impl ByteSource {
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Memory(Arc::from(bytes.into()))
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Local path backing this source, if any.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            _ => None,
        }
    }

    /// Opens a fresh reader over the bytes.
    ///
    /// # Errors
    /// * [`StorageError::NotFound`] if a local file has disappeared.
    /// * [`StorageError::Unsupported`] for remote sources without the `remote` feature.
    pub async fn open(&self) -> Result<Box<dyn AsyncRead + Send + Unpin>, StorageError> {
        match self {
            Self::Empty => Ok(Box::new(tokio::io::empty())),
            Self::Memory(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
            Self::File(path) => match fs::File::open(path).await {
                Ok(file) => Ok(Box::new(file)),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    Err(StorageError::not_found(path.display().to_string()))
                },
                Err(err) => Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Open failed: {}", path.display()).into()),
                }),
            },
            Self::Remote(url) => open_remote(url).await,
        }
    }

    /// Reads every byte of the source into memory.
    ///
    /// # Errors
    /// Same as [`ByteSource::open`], plus I/O failures while reading.
    pub async fn read_all(&self) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.open().await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.context("Read failed")?;
        Ok(buf)
    }
}

#[cfg(feature = "remote")]
async fn open_remote(url: &Url) -> Result<Box<dyn AsyncRead + Send + Unpin>, StorageError> {
    let body = reqwest::get(url.clone())
        .await
        .context(format!("Fetching {url}"))?
        .error_for_status()
        .context(format!("Fetching {url}"))?
        .bytes()
        .await
        .context(format!("Reading {url}"))?;
    Ok(Box::new(Cursor::new(body.to_vec())))
}

#[cfg(not(feature = "remote"))]
#[allow(clippy::unused_async)]
async fn open_remote(url: &Url) -> Result<Box<dyn AsyncRead + Send + Unpin>, StorageError> {
    Err(StorageError::Unsupported {
        message: url.to_string().into(),
        context: Some("Remote references require the `remote` feature".into()),
    })
}

/// Descriptor of one stored (or to-be-stored) artifact.
///
/// Incoming items carry the caller's declared size; descriptors returned by the store
/// carry the size observed on disk.
#[derive(Debug, Clone, Default)]
pub struct ContentItem {
    pub(crate) id: String,
    pub(crate) qualifier: String,
    pub(crate) filename: String,
    pub(crate) mime_type: Option<String>,
    pub(crate) size: u64,
    pub(crate) source: ByteSource,
    pub(crate) metacard: Option<Metacard>,
}

impl ContentItem {
    #[must_use]
    pub fn new(id: impl Into<String>, source: ByteSource) -> Self {
        Self { id: id.into(), source, ..Self::default() }
    }

    /// In-memory item whose declared size is the buffer length.
    #[must_use]
    pub fn from_bytes(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let size = bytes.len() as u64;
        Self::new(id, ByteSource::from_bytes(bytes)).with_size(size)
    }

    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_metacard(mut self, metacard: Metacard) -> Self {
        self.metacard = Some(metacard);
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    #[must_use]
    pub fn uri(&self) -> ContentUri {
        ContentUri::new(self.id.clone(), self.qualifier.clone())
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Whether the filename is missing or the placeholder default, meaning an
    /// update should keep the stored one.
    #[must_use]
    pub fn has_default_filename(&self) -> bool {
        is_blank(&self.filename) || self.filename == DEFAULT_FILE_NAME
    }

    /// The declared mime type, or `application/octet-stream`.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE)
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn source(&self) -> &ByteSource {
        &self.source
    }

    #[must_use]
    pub const fn metacard(&self) -> Option<&Metacard> {
        self.metacard.as_ref()
    }

    pub const fn metacard_mut(&mut self) -> Option<&mut Metacard> {
        self.metacard.as_mut()
    }

    /// Reads the full content.
    ///
    /// # Errors
    /// See [`ByteSource::read_all`].
    pub async fn read_all(&self) -> Result<Vec<u8>, StorageError> {
        self.source.read_all().await
    }

    /// Structural checks run before anything touches the disk.
    ///
    /// # Errors
    /// [`StorageError::Validation`] when the id is blank, any of id, qualifier, or
    /// filename is not a safe single path segment, or the item has neither bytes nor a
    /// metacard.
    pub fn validate(&self) -> Result<(), StorageError> {
        validate_segment("id", &self.id)?;
        if !is_blank(&self.qualifier) {
            validate_segment("qualifier", &self.qualifier)?;
        }
        if !is_blank(&self.filename) {
            validate_segment("filename", &self.filename)?;
        }
        if self.source.is_empty() && self.metacard.is_none() {
            return Err(StorageError::Validation {
                message: self.uri().to_string().into(),
                context: Some("Item has neither content nor a metacard".into()),
            });
        }
        Ok(())
    }
}

/// Combines an update with the currently stored item: bytes, size, and metacard come
/// from `update`; filename and mime type are inherited from `existing`.
#[must_use]
pub fn merge_for_update(update: ContentItem, existing: &ContentItem) -> ContentItem {
    ContentItem {
        filename: existing.filename.clone(),
        mime_type: existing.mime_type.clone(),
        ..update
    }
}
