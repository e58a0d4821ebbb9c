//! The transactional content store.
//!
//! [`ContentStore`] is the entry point for every operation. Creates, updates, and deletes
//! only stage work under a request id; nothing becomes visible in the permanent store
//! until [`ContentStore::commit`] runs for that id, and [`ContentStore::rollback`]
//! discards it. Both always clean the request's staging area.

use crate::backend::{ContentBackend, FileSystemBackend};
use crate::builder::ContentStoreBuilder;
use crate::settings::ContentStoreConfig;
use crate::error::StorageError;
use crate::item::{ByteSource, ContentItem, ContentUri, Metacard, merge_for_update};
use crate::request::{RequestId, StorageRequest, StorageResponse};
use crate::security::validate_segment;
use crate::transaction::{self, PendingKind, PendingRegistry};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Shared state behind a [`ContentStore`] handle.
#[derive(Debug)]
pub struct ContentStoreInner<B> {
    pub(crate) backend: B,
    pub(crate) pending: PendingRegistry,
}

/// A thread-safe handle to the content store.
///
/// The handle is reference-counted and cheap to clone. Distinct request ids are fully
/// independent; a single request id must be driven by one caller at a time, ending with
/// exactly one [`commit`](Self::commit) or [`rollback`](Self::rollback).
///
/// # Example
///
/// ```rust
/// use depot_storage::{ContentItem, ContentStore, ContentUri, RequestId, StorageError, StorageRequest};
///
/// #[tokio::main]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     # let root = tmp.path().join("data");
///     let store = ContentStore::builder().root(&root).connect().await?;
///
///     let request_id = RequestId::try_from("ingest-0001")?;
///     let item = ContentItem::from_bytes("abc123", b"hello".to_vec()).with_filename("doc.txt");
///     store.create(StorageRequest::new(request_id.clone(), vec![item])).await?;
///     store.commit(&request_id).await?;
///
///     let stored = store.read(&ContentUri::primary("abc123")).await?;
///     assert_eq!(stored.filename(), "doc.txt");
///     assert_eq!(stored.read_all().await?, b"hello");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct ContentStore<B: ContentBackend = FileSystemBackend> {
    pub(crate) inner: Arc<ContentStoreInner<B>>,
}

impl<B: ContentBackend> Clone for ContentStore<B> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<B: ContentBackend> Deref for ContentStore<B> {
    type Target = ContentStoreInner<B>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl ContentStore {
    #[must_use = "The content store is not initialized until you call .connect()"]
    pub fn builder() -> ContentStoreBuilder {
        ContentStoreBuilder::new()
    }

    /// Builds and connects a local-disk store from loaded configuration.
    ///
    /// # Errors
    /// Same as [`ContentStoreBuilder::connect`].
    pub async fn from_config(config: &ContentStoreConfig) -> Result<Self, StorageError> {
        Self::builder()
            .root(&config.base_dir)
            .create(config.create)
            .purge_stale_staging(
                config.purge_stale_staging.then(|| Duration::from_secs(config.stale_staging_secs)),
            )
            .connect()
            .await
    }
}

impl<B: ContentBackend> ContentStore<B> {
    /// Wraps an already initialized backend.
    #[must_use]
    pub fn with_backend(backend: B) -> Self {
        Self { inner: Arc::new(ContentStoreInner { backend, pending: PendingRegistry::default() }) }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Stages every valid item of the request.
    ///
    /// Invalid items, repeats of a URI already staged by the same call, and items whose
    /// staging fails are listed in [`StorageResponse::rejected`]; the remaining items are
    /// still staged. Staging a URI again under the same request id in a later call
    /// replaces the earlier staged content.
    ///
    /// # Errors
    /// [`StorageError::Validation`] if the request id already has pending deletes.
    pub async fn create(&self, request: StorageRequest) -> Result<StorageResponse, StorageError> {
        trace!(request_id = %request.id(), items = request.items().len(), "Create started");
        let (request_id, items, reference) = request.into_parts();
        self.pending.ensure_accepts(&request_id, PendingKind::Updates)?;

        let mut response = StorageResponse::new(request_id);
        for item in items {
            self.stage_one(&mut response, &item, reference.as_deref()).await;
        }

        self.pending.record_updates(&response.request_id, response.items.iter().map(ContentItem::uri))?;
        trace!(request_id = %response.request_id, staged = response.items.len(), "Create finished");
        Ok(response)
    }

    /// Stages replacements for existing items.
    ///
    /// Items without a filename (or with the placeholder default) inherit the filename and
    /// mime type of the stored version. Primary items whose metacard has no resource URI
    /// yet get it filled in along with the resource size.
    ///
    /// # Errors
    /// [`StorageError::Validation`] if the request id already has pending deletes.
    pub async fn update(&self, request: StorageRequest) -> Result<StorageResponse, StorageError> {
        trace!(request_id = %request.id(), items = request.items().len(), "Update started");
        let (request_id, items, reference) = request.into_parts();
        self.pending.ensure_accepts(&request_id, PendingKind::Updates)?;

        let mut response = StorageResponse::new(request_id);
        for item in items {
            let item = match self.inherit_naming(item).await {
                Ok(item) => item,
                Err((id, err)) => {
                    warn!(request_id = %response.request_id, id = %id, error = %err, "Cannot update content item");
                    response.reject(id, err);
                    continue;
                },
            };
            self.stage_one(&mut response, &item, reference.as_deref()).await;
        }

        for item in &mut response.items {
            fill_resource_attributes(item);
        }

        self.pending.record_updates(&response.request_id, response.items.iter().map(ContentItem::uri))?;
        trace!(request_id = %response.request_id, staged = response.items.len(), "Update finished");
        Ok(response)
    }

    /// Schedules removal of everything stored under each metacard's id.
    ///
    /// Metacards with nothing on disk are skipped silently; invalid ids are rejected.
    ///
    /// # Errors
    /// * [`StorageError::Validation`] if the request id already has pending creates or
    ///   updates.
    /// * [`StorageError::Io`] if the permanent store cannot be inspected.
    pub async fn delete(
        &self,
        request_id: RequestId,
        metacards: Vec<Metacard>,
    ) -> Result<StorageResponse, StorageError> {
        trace!(request_id = %request_id, metacards = metacards.len(), "Delete started");
        self.pending.ensure_accepts(&request_id, PendingKind::Deletions)?;

        let mut response = StorageResponse::new(request_id);
        let mut scheduled = Vec::new();
        for metacard in metacards {
            if let Err(err) = validate_segment("id", &metacard.id) {
                warn!(request_id = %response.request_id, id = %metacard.id, error = %err, "Cannot delete invalid content item");
                response.reject(metacard.id, err);
                continue;
            }
            if !self.backend.contains(&metacard.id).await? {
                debug!(request_id = %response.request_id, id = %metacard.id, "Nothing stored, skipping delete");
                continue;
            }
            debug!(request_id = %response.request_id, id = %metacard.id, "Delete scheduled");
            response.items.push(
                ContentItem::new(metacard.id.clone(), ByteSource::Empty).with_metacard(metacard.clone()),
            );
            scheduled.push(metacard);
        }

        self.pending.record_deletions(&response.request_id, scheduled)?;
        trace!(request_id = %response.request_id, scheduled = response.items.len(), "Delete finished");
        Ok(response)
    }

    /// Reads a committed item.
    ///
    /// # Errors
    /// * [`StorageError::NotFound`] if nothing is stored at `uri` or an external reference
    ///   points at a missing local file.
    /// * [`StorageError::Corruption`] if the slot holds zero or several files.
    pub async fn read(&self, uri: &ContentUri) -> Result<ContentItem, StorageError> {
        trace!(uri = %uri, "Read started");
        self.find(uri).await?.ok_or_else(|| StorageError::not_found(uri.to_string()))
    }

    /// Like [`read`](Self::read), with a missing item reported as `Ok(None)`.
    ///
    /// # Errors
    /// Same as [`read`](Self::read), except for the missing-slot case.
    pub async fn find(&self, uri: &ContentUri) -> Result<Option<ContentItem>, StorageError> {
        validate_segment("id", uri.id())?;
        if !uri.is_primary() {
            validate_segment("qualifier", uri.qualifier())?;
        }
        self.backend.read(uri).await
    }

    /// Publishes the pending work of `request_id` and releases its staging area.
    ///
    /// A request with nothing pending commits as a no-op.
    ///
    /// # Errors
    /// The first publish failure, reported after every pending item was attempted and
    /// staging was released; otherwise a staging cleanup failure.
    pub async fn commit(&self, request_id: &RequestId) -> Result<(), StorageError> {
        trace!(request_id = %request_id, "Commit started");
        let result = transaction::commit(&self.backend, &self.pending, request_id).await;
        if let Err(err) = &result {
            warn!(request_id = %request_id, error = %err, "Commit failed");
        }
        result
    }

    /// Discards the pending work of `request_id` and releases its staging area. Safe to
    /// call repeatedly.
    ///
    /// # Errors
    /// [`StorageError::Io`] if the staging area exists but cannot be removed. Pending
    /// bookkeeping is cleared regardless.
    pub async fn rollback(&self, request_id: &RequestId) -> Result<(), StorageError> {
        trace!(request_id = %request_id, "Rollback started");
        transaction::rollback(&self.backend, &self.pending, request_id).await
    }

    /// Whether `request_id` has staged or scheduled work awaiting commit or rollback.
    #[must_use]
    pub fn has_pending(&self, request_id: &RequestId) -> bool {
        self.pending.is_pending(request_id)
    }

    async fn stage_one(
        &self,
        response: &mut StorageResponse,
        item: &ContentItem,
        reference: Option<&str>,
    ) {
        let request_id = &response.request_id;
        if let Err(err) = item.validate() {
            warn!(request_id = %request_id, id = %item.id(), error = %err, "Skipping invalid content item");
            response.reject(item.id(), err);
            return;
        }

        let uri = item.uri();
        if response.items.iter().any(|staged| staged.uri() == uri) {
            warn!(request_id = %request_id, uri = %uri, "Skipping duplicate content item");
            response.reject(item.id(), StorageError::validation(format!("{uri} appears twice in one request")));
            return;
        }

        match self.backend.stage(request_id, item, reference).await {
            Ok(staged) => {
                debug!(request_id = %request_id, uri = %staged.uri(), size = staged.size(), "Content staged");
                response.items.push(staged);
            },
            Err(err) => {
                warn!(request_id = %request_id, id = %item.id(), error = %err, "Staging failed");
                response.reject(item.id(), err);
            },
        }
    }

    async fn inherit_naming(&self, item: ContentItem) -> Result<ContentItem, (String, StorageError)> {
        if !item.has_default_filename() {
            return Ok(item);
        }
        if let Err(err) = item.validate() {
            return Err((item.id, err));
        }
        match self.backend.read(&item.uri()).await {
            Ok(Some(existing)) => Ok(merge_for_update(item, &existing)),
            Ok(None) => Ok(item),
            Err(err) if err.is_not_found() => Ok(item),
            Err(err) => Err((item.id, err)),
        }
    }
}

fn fill_resource_attributes(item: &mut ContentItem) {
    if !item.uri().is_primary() {
        return;
    }
    let uri = item.uri().to_string();
    let size = item.size();
    if let Some(metacard) = item.metacard_mut()
        && metacard.resource_uri.is_none()
    {
        metacard.resource_uri = Some(uri);
        metacard.resource_size = Some(size);
    }
}
