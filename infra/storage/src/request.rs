use crate::error::StorageError;
use crate::item::ContentItem;
use crate::security::validate_segment;
use std::fmt;
use std::sync::Arc;

/// Identifier correlating the operations of one batch with its commit or rollback.
///
/// It names the per-request staging directory, so it must be a single safe path
/// segment. Three-character ids are refused: content shards under the store root are
/// always exactly three characters wide, and the staging root (`tmp`) is one of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(Arc<str>);

impl RequestId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for RequestId {
    type Error = StorageError;

    fn try_from(value: &str) -> Result<Self, StorageError> {
        validate_segment("request id", value)?;

        if value.chars().count() == 3 {
            return Err(StorageError::Validation {
                message: value.to_owned().into(),
                context: Some("Request id cannot be exactly three characters long".into()),
            });
        }

        Ok(Self(Arc::from(value)))
    }
}

impl TryFrom<String> for RequestId {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, StorageError> {
        Self::try_from(value.as_str())
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A create or update batch.
#[derive(Debug, Clone)]
pub struct StorageRequest {
    id: RequestId,
    items: Vec<ContentItem>,
    store_reference: Option<String>,
}

impl StorageRequest {
    #[must_use]
    pub const fn new(id: RequestId, items: Vec<ContentItem>) -> Self {
        Self { id, items, store_reference: None }
    }

    /// Stores every item of the batch as a pointer to `reference` instead of copying
    /// its bytes.
    #[must_use]
    pub fn with_store_reference(mut self, reference: impl Into<String>) -> Self {
        self.store_reference = Some(reference.into());
        self
    }

    #[must_use]
    pub const fn id(&self) -> &RequestId {
        &self.id
    }

    #[must_use]
    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    #[must_use]
    pub fn store_reference(&self) -> Option<&str> {
        self.store_reference.as_deref()
    }

    pub(crate) fn into_parts(self) -> (RequestId, Vec<ContentItem>, Option<String>) {
        (self.id, self.items, self.store_reference)
    }
}

/// An item the store skipped, and why.
#[derive(Debug)]
pub struct Rejected {
    pub id: String,
    pub error: StorageError,
}

/// Outcome of a create, update, or delete call. Items listed here are pending until
/// the request is committed.
#[derive(Debug)]
pub struct StorageResponse {
    pub request_id: RequestId,
    pub items: Vec<ContentItem>,
    pub rejected: Vec<Rejected>,
}

impl StorageResponse {
    pub(crate) const fn new(request_id: RequestId) -> Self {
        Self { request_id, items: Vec::new(), rejected: Vec::new() }
    }

    pub(crate) fn reject(&mut self, id: impl Into<String>, error: StorageError) {
        self.rejected.push(Rejected { id: id.into(), error });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_accepts_uuids() {
        let id = RequestId::try_from("6f1c1d1e-7a0b-4c39-9d25-1b0c7e2f4a11").unwrap();
        assert_eq!(id.as_str(), "6f1c1d1e-7a0b-4c39-9d25-1b0c7e2f4a11");
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn request_id_rejects_unsafe_values() {
        for raw in ["", "..", "a/b", "tmp", "abc"] {
            assert!(RequestId::try_from(raw).is_err(), "{raw:?} should be rejected");
        }
    }
}
