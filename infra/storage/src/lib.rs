//! A staged, transactional content store on the local filesystem.
//!
//! Binary content items are written under a caller-chosen request id into a private
//! staging area and only become visible once that request is committed. A rollback, or a
//! crash followed by the startup sweep, discards them without touching the permanent
//! store. All examples use temporary directories.
//!
//! # Core Features
//!
//! - **Two-phase writes**: `create`/`update`/`delete` stage work; `commit` publishes it with a
//!   directory rename (copy fallback across devices); `rollback` throws it away.
//! - **Request isolation**: every request id owns its own staging tree and pending entry;
//!   unrelated requests never contend on a global lock.
//! - **Sharded layout**: `<id[0:3]>/<id[3:6]>/<id>[/<qualifier>]/<filename>` bounds directory
//!   fan-out and is shared with existing stores bit-for-bit.
//! - **External references**: items can be stored as a `.external-reference` sidecar
//!   pointing at bytes that live elsewhere.
//! - **Self-healing**: staging trees abandoned by a crashed process are swept on startup.
//!
//! # Architectural Overview
//!
//! 1.  **[`ContentStore`]**: the thread-safe handle and entry point; owns request bookkeeping.
//! 2.  **[`ContentBackend`]**: the storage capability the store drives;
//!     [`FileSystemBackend`] is the local-disk implementation.
//! 3.  **[`ContentStoreBuilder`]**: a type-safe fluent builder for the local-disk store.
//!
//! # Examples
//!
//! ```rust
//! use depot_storage::{
//!     ContentItem, ContentStore, ContentUri, Metacard, RequestId, StorageError, StorageRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("data");
//!     let store = ContentStore::builder().root(&root).create(true).connect().await?;
//!
//!     // Stage, then publish.
//!     let ingest = RequestId::try_from("ingest-42")?;
//!     let item = ContentItem::from_bytes("abc123", b"hello".to_vec()).with_filename("doc.txt");
//!     let staged = store.create(StorageRequest::new(ingest.clone(), vec![item])).await?;
//!     assert_eq!(staged.items[0].size(), 5);
//!     store.commit(&ingest).await?;
//!
//!     let uri: ContentUri = "content:abc123".parse()?;
//!     assert_eq!(store.read(&uri).await?.read_all().await?, b"hello");
//!
//!     // Deletes follow the same protocol.
//!     let purge = RequestId::try_from("purge-42")?;
//!     store.delete(purge.clone(), vec![Metacard::new("abc123")]).await?;
//!     store.commit(&purge).await?;
//!     assert!(store.find(&uri).await?.is_none());
//!
//!     Ok(())
//! }
//! ```

mod backend;
mod builder;
mod dirs;
mod engine;
mod error;
mod item;
mod maintenance;
mod materialize;
mod mime;
mod publish;
mod reader;
mod reference;
mod request;
mod security;
mod settings;
mod shard;
mod staging;
mod transaction;

pub use backend::{ContentBackend, FileSystemBackend};
pub use builder::{ContentStoreBuilder, DEFAULT_STALE_STAGING, STORE_DIR};
pub use engine::{ContentStore, ContentStoreInner};
pub use error::{StorageError, StorageErrorExt};
pub use item::{
    ByteSource, CONTENT_SCHEME, ContentItem, ContentUri, DEFAULT_FILE_NAME, DEFAULT_MIME_TYPE,
    Metacard, merge_for_update,
};
pub use mime::{DefaultMimeTypeMapper, MimeTypeMapper, SNIFF_LEN, probe_content_type};
pub use reference::REFERENCE_EXTENSION;
pub use request::{Rejected, RequestId, StorageRequest, StorageResponse};
pub use settings::{ContentStoreConfig, ENV_PREFIX, load_config};
pub use shard::shard_path;
pub use staging::{STAGING_DIR, StagingArea};
