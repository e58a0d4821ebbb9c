//! Per-request pending work and the commit/rollback discipline.
//!
//! A request id is "open" exactly while it has an entry in one of the two pending maps.
//! Commit and rollback always end by releasing the request's staging area, whatever the
//! outcome of publishing.

use crate::backend::ContentBackend;
use crate::error::StorageError;
use crate::item::{ContentUri, Metacard};
use crate::request::RequestId;
use dashmap::DashMap;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub(crate) enum Pending {
    Updates(Vec<ContentUri>),
    Deletions(Vec<Metacard>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingKind {
    Updates,
    Deletions,
}

/// Concurrent registry of staged updates and scheduled deletions, keyed by request id.
#[derive(Debug, Default)]
pub(crate) struct PendingRegistry {
    updates: DashMap<RequestId, Vec<ContentUri>>,
    deletions: DashMap<RequestId, Vec<Metacard>>,
}

impl PendingRegistry {
    /// Fails when `request_id` already carries pending work of the other kind.
    pub(crate) fn ensure_accepts(
        &self,
        request_id: &RequestId,
        kind: PendingKind,
    ) -> Result<(), StorageError> {
        let conflict = match kind {
            PendingKind::Updates => self.deletions.contains_key(request_id),
            PendingKind::Deletions => self.updates.contains_key(request_id),
        };
        if conflict {
            return Err(StorageError::Validation {
                message: request_id.to_string().into(),
                context: Some("Deletes cannot share a request with creates or updates".into()),
            });
        }
        Ok(())
    }

    pub(crate) fn record_updates(
        &self,
        request_id: &RequestId,
        uris: impl IntoIterator<Item = ContentUri>,
    ) -> Result<(), StorageError> {
        self.ensure_accepts(request_id, PendingKind::Updates)?;
        let uris: Vec<_> = uris.into_iter().collect();
        if !uris.is_empty() {
            self.updates.entry(request_id.clone()).or_default().extend(uris);
        }
        Ok(())
    }

    pub(crate) fn record_deletions(
        &self,
        request_id: &RequestId,
        metacards: Vec<Metacard>,
    ) -> Result<(), StorageError> {
        self.ensure_accepts(request_id, PendingKind::Deletions)?;
        if !metacards.is_empty() {
            self.deletions.entry(request_id.clone()).or_default().extend(metacards);
        }
        Ok(())
    }

    /// Removes and returns the pending work of `request_id`, deletions first.
    pub(crate) fn take(&self, request_id: &RequestId) -> Option<Pending> {
        if let Some((_, metacards)) = self.deletions.remove(request_id) {
            return Some(Pending::Deletions(metacards));
        }
        self.updates.remove(request_id).map(|(_, uris)| Pending::Updates(uris))
    }

    /// Drops all pending work of `request_id`; returns whether there was any.
    pub(crate) fn clear(&self, request_id: &RequestId) -> bool {
        let deletions = self.deletions.remove(request_id).is_some();
        let updates = self.updates.remove(request_id).is_some();
        deletions || updates
    }

    pub(crate) fn is_pending(&self, request_id: &RequestId) -> bool {
        self.updates.contains_key(request_id) || self.deletions.contains_key(request_id)
    }
}

/// Publishes the pending work of `request_id`, then releases its staging area.
///
/// Every pending item is attempted; the first failure is returned once staging has been
/// released.
pub(crate) async fn commit<B: ContentBackend>(
    backend: &B,
    pending: &PendingRegistry,
    request_id: &RequestId,
) -> Result<(), StorageError> {
    let outcome = match pending.take(request_id) {
        Some(Pending::Deletions(metacards)) => publish_deletions(backend, request_id, &metacards).await,
        Some(Pending::Updates(uris)) => publish_updates(backend, request_id, uris).await,
        None => {
            info!(request_id = %request_id, "Nothing to commit");
            Ok(())
        },
    };

    let released = backend.release_staging(request_id).await;
    if outcome.is_err()
        && let Err(err) = &released
    {
        warn!(request_id = %request_id, error = %err, "Staging left behind after failed commit");
    }
    outcome?;
    released.map(|_| ())
}

/// Drops the pending work of `request_id` and releases its staging area.
pub(crate) async fn rollback<B: ContentBackend>(
    backend: &B,
    pending: &PendingRegistry,
    request_id: &RequestId,
) -> Result<(), StorageError> {
    let had_pending = pending.clear(request_id);
    let released = backend.release_staging(request_id).await?;
    debug!(request_id = %request_id, had_pending, released, "Request rolled back");
    Ok(())
}

async fn publish_deletions<B: ContentBackend>(
    backend: &B,
    request_id: &RequestId,
    metacards: &[Metacard],
) -> Result<(), StorageError> {
    let mut first_error = None;
    for metacard in metacards {
        if let Err(err) = backend.publish_delete(&metacard.id).await {
            warn!(request_id = %request_id, id = %metacard.id, error = %err, "Delete failed");
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Qualified items are published before their primary item so that a primary rename
/// never carries qualifier directories along with it.
async fn publish_updates<B: ContentBackend>(
    backend: &B,
    request_id: &RequestId,
    mut uris: Vec<ContentUri>,
) -> Result<(), StorageError> {
    uris.sort_by(|a, b| (a.is_primary(), a).cmp(&(b.is_primary(), b)));
    uris.dedup();

    let mut first_error = None;
    for uri in &uris {
        if let Err(err) = backend.publish_move(request_id, uri).await {
            warn!(request_id = %request_id, uri = %uri, error = %err, "Publish failed");
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ContentItem;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(raw: &str) -> RequestId {
        RequestId::try_from(raw).unwrap()
    }

    #[test]
    fn empty_batches_leave_no_entry() {
        let registry = PendingRegistry::default();
        let id = request("req-1");

        registry.record_updates(&id, Vec::new()).unwrap();
        registry.record_deletions(&id, Vec::new()).unwrap();

        assert!(!registry.is_pending(&id));
        assert!(registry.take(&id).is_none());
    }

    #[test]
    fn kinds_never_mix_under_one_request() {
        let registry = PendingRegistry::default();
        let id = request("req-2");

        registry.record_updates(&id, [ContentUri::primary("abc123")]).unwrap();
        let err = registry.record_deletions(&id, vec![Metacard::new("abc123")]).unwrap_err();

        assert!(err.is_validation());
        assert!(matches!(registry.take(&id), Some(Pending::Updates(uris)) if uris.len() == 1));
        assert!(!registry.is_pending(&id));
    }

    #[test]
    fn updates_accumulate_across_calls() {
        let registry = PendingRegistry::default();
        let id = request("req-3");

        registry.record_updates(&id, [ContentUri::primary("abc123")]).unwrap();
        registry.record_updates(&id, [ContentUri::new("abc123", "thumb")]).unwrap();

        assert!(matches!(registry.take(&id), Some(Pending::Updates(uris)) if uris.len() == 2));
    }

    #[test]
    fn clear_reports_previous_state() {
        let registry = PendingRegistry::default();
        let id = request("req-4");

        registry.record_deletions(&id, vec![Metacard::new("abc123")]).unwrap();
        assert!(registry.clear(&id));
        assert!(!registry.clear(&id));
    }

    /// Fails every publish and every staging release.
    #[derive(Debug, Default)]
    struct BrokenBackend {
        releases: AtomicUsize,
    }

    impl ContentBackend for BrokenBackend {
        async fn stage(
            &self,
            _request_id: &RequestId,
            item: &ContentItem,
            _reference: Option<&str>,
        ) -> Result<ContentItem, StorageError> {
            Ok(item.clone())
        }

        async fn read(&self, _uri: &ContentUri) -> Result<Option<ContentItem>, StorageError> {
            Ok(None)
        }

        async fn contains(&self, _id: &str) -> Result<bool, StorageError> {
            Ok(true)
        }

        async fn publish_move(&self, _request_id: &RequestId, uri: &ContentUri) -> Result<(), StorageError> {
            Err(StorageError::corruption(uri.to_string()))
        }

        async fn publish_delete(&self, id: &str) -> Result<(), StorageError> {
            Err(StorageError::corruption(id.to_owned()))
        }

        async fn release_staging(&self, _request_id: &RequestId) -> Result<bool, StorageError> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Io { source: std::io::ErrorKind::PermissionDenied.into(), context: None })
        }
    }

    #[tokio::test]
    async fn failed_commit_reports_publish_error_over_release_error() {
        let backend = BrokenBackend::default();
        let registry = PendingRegistry::default();
        let id = request("req-5");
        registry.record_updates(&id, [ContentUri::primary("abc123")]).unwrap();

        let err = commit(&backend, &registry, &id).await.unwrap_err();

        assert!(err.is_corruption());
        assert_eq!(backend.releases.load(Ordering::SeqCst), 1);
        assert!(!registry.is_pending(&id));
    }
}
