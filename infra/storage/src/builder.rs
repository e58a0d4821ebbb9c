use crate::backend::FileSystemBackend;
use crate::engine::ContentStore;
use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance;
use crate::mime::{DefaultMimeTypeMapper, MimeTypeMapper};
use crate::staging::{STAGING_DIR, StagingArea};
use private::Sealed;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::info;

/// Location of the permanent store below the base directory.
pub const STORE_DIR: &str = "content/store";

/// Staging trees untouched for this long are treated as crash leftovers.
pub const DEFAULT_STALE_STAGING: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct BuilderConfig {
    create: bool,
    stale_staging: Option<Duration>,
    mime: Arc<dyn MimeTypeMapper>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            create: true,
            stale_staging: Some(DEFAULT_STALE_STAGING),
            mime: Arc::new(DefaultMimeTypeMapper),
        }
    }
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct ContentStoreBuilder<S: Sealed = NoRoot> {
    state: S,
    config: BuilderConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> ContentStoreBuilder<S> {
    #[must_use = "Sets whether missing store directories should be created"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    /// Age after which an abandoned per-request staging tree is removed on connect;
    /// `None` disables the sweep.
    #[must_use = "Sets the stale staging threshold"]
    pub const fn purge_stale_staging(mut self, threshold: Option<Duration>) -> Self {
        self.config.stale_staging = threshold;
        self
    }

    #[must_use = "Sets the mime type mapper used on read"]
    pub fn mime_mapper(mut self, mapper: impl MimeTypeMapper) -> Self {
        self.config.mime = Arc::new(mapper);
        self
    }

    fn transition<N: Sealed>(self, state: N) -> ContentStoreBuilder<N> {
        ContentStoreBuilder { state, config: self.config }
    }
}

impl ContentStoreBuilder<NoRoot> {
    #[must_use = "Creates a new content store builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Base directory; the store itself lives in `<base>/content/store`.
    #[must_use = "Sets the base directory of the content store"]
    pub fn root(self, path: impl Into<PathBuf>) -> ContentStoreBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }
}

impl ContentStoreBuilder<WithRoot> {
    /// Consumes the configuration and opens the content store.
    ///
    /// Boot sequence:
    /// 1. Creates `<base>/content/store/tmp` when `create(true)` was set.
    /// 2. Canonicalizes the store root so every derived path is absolute.
    /// 3. Sweeps staging trees older than the stale threshold, left behind by processes
    ///    that died between staging and commit or rollback. Sweep failures are logged and
    ///    never fail startup.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if:
    /// - The store directories do not exist and `create` is false.
    /// - The process lacks permissions to create or resolve them.
    pub async fn connect(self) -> Result<ContentStore, StorageError> {
        let store = self.state.0.join(STORE_DIR);

        if self.config.create {
            create_layout(&store).await?;
        }

        let store_root = fs::canonicalize(&store)
            .await
            .context(format!("Failed to resolve content store: {}", store.display()))?;
        let staging_root = store_root.join(STAGING_DIR);
        if !self.config.create {
            fs::metadata(&staging_root)
                .await
                .context(format!("Missing staging area: {}", staging_root.display()))?;
        }

        if let Some(threshold) = self.config.stale_staging {
            maintenance::purge_stale_staging(&staging_root, threshold).await;
        }

        info!(path = %store_root.display(), "Content store ready");
        let backend =
            FileSystemBackend::new(store_root, StagingArea::new(staging_root), self.config.mime);
        Ok(ContentStore::with_backend(backend))
    }
}

async fn create_layout(store: &Path) -> Result<(), StorageError> {
    let staging = store.join(STAGING_DIR);
    fs::create_dir_all(&staging)
        .await
        .context(format!("Failed to bootstrap content store: {}", staging.display()))?;
    Ok(())
}
