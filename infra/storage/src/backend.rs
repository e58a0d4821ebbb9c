//! The storage capability the engine drives.
//!
//! [`ContentStore`](crate::ContentStore) owns request bookkeeping and the commit/rollback
//! discipline; a [`ContentBackend`] only knows how to stage, read, publish, and clean up
//! bytes. [`FileSystemBackend`] is the local-disk implementation.

use crate::dirs;
use crate::error::StorageError;
use crate::item::{ContentItem, ContentUri};
use crate::materialize::materialize;
use crate::mime::MimeTypeMapper;
use crate::publish;
use crate::reader::read_content;
use crate::request::RequestId;
use crate::shard::shard_dir;
use crate::staging::StagingArea;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub trait ContentBackend: Debug + Send + Sync + 'static {
    /// Materializes `item` into the staging area of `request_id`, as a copy or, when
    /// `reference` is set, as an external-reference sidecar.
    fn stage(
        &self,
        request_id: &RequestId,
        item: &ContentItem,
        reference: Option<&str>,
    ) -> impl Future<Output = Result<ContentItem, StorageError>> + Send;

    /// Reads the permanent item at `uri`; `Ok(None)` when nothing is stored there.
    fn read(
        &self,
        uri: &ContentUri,
    ) -> impl Future<Output = Result<Option<ContentItem>, StorageError>> + Send;

    /// Whether anything is stored under `id` in the permanent store.
    fn contains(&self, id: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn publish_move(
        &self,
        request_id: &RequestId,
        uri: &ContentUri,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Deletes every item stored under `id`, qualifiers included.
    fn publish_delete(&self, id: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Removes the staging area of `request_id`; returns whether anything was removed.
    fn release_staging(
        &self,
        request_id: &RequestId,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

/// Local-disk backend laid out as `<store>/<shard path>/<filename>` with staging under
/// `<store>/tmp/<request id>/`.
#[derive(Debug, Clone)]
pub struct FileSystemBackend {
    store_root: PathBuf,
    staging: StagingArea,
    mime: Arc<dyn MimeTypeMapper>,
}

impl FileSystemBackend {
    pub(crate) const fn new(
        store_root: PathBuf,
        staging: StagingArea,
        mime: Arc<dyn MimeTypeMapper>,
    ) -> Self {
        Self { store_root, staging, mime }
    }

    #[must_use]
    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    #[must_use]
    pub fn staging_root(&self) -> &Path {
        self.staging.root()
    }

    /// Permanent directory of `uri`.
    #[must_use]
    pub fn content_dir(&self, uri: &ContentUri) -> PathBuf {
        shard_dir(&self.store_root, uri)
    }

    /// Staging directory of `uri` within `request_id`.
    #[must_use]
    pub fn staging_dir(&self, request_id: &RequestId, uri: &ContentUri) -> PathBuf {
        self.staging.item_dir(request_id, uri)
    }
}

impl ContentBackend for FileSystemBackend {
    async fn stage(
        &self,
        request_id: &RequestId,
        item: &ContentItem,
        reference: Option<&str>,
    ) -> Result<ContentItem, StorageError> {
        let dir = self.staging.stage_dir(request_id, &item.uri()).await?;
        materialize(item, &dir, reference).await
    }

    async fn read(&self, uri: &ContentUri) -> Result<Option<ContentItem>, StorageError> {
        read_content(&self.content_dir(uri), uri, self.mime.as_ref()).await
    }

    async fn contains(&self, id: &str) -> Result<bool, StorageError> {
        dirs::has_entries(&self.content_dir(&ContentUri::primary(id))).await
    }

    async fn publish_move(
        &self,
        request_id: &RequestId,
        uri: &ContentUri,
    ) -> Result<(), StorageError> {
        publish::publish_move(&self.staging_dir(request_id, uri), &self.content_dir(uri)).await
    }

    async fn publish_delete(&self, id: &str) -> Result<(), StorageError> {
        publish::publish_delete(&self.content_dir(&ContentUri::primary(id))).await
    }

    async fn release_staging(&self, request_id: &RequestId) -> Result<bool, StorageError> {
        self.staging.release(request_id).await
    }
}
