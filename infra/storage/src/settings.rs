use crate::error::{StorageError, StorageErrorExt};
use config::{Config, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of environment overrides, e.g. `DEPOT__BASE_DIR`.
pub const ENV_PREFIX: &str = "DEPOT";

/// Settings for a local-disk [`ContentStore`](crate::ContentStore).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContentStoreConfig {
    /// Base directory; content lives under `<base_dir>/content/store`.
    pub base_dir: PathBuf,
    pub create: bool,
    pub purge_stale_staging: bool,
    pub stale_staging_secs: u64,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("data"),
            create: true,
            purge_stale_staging: true,
            stale_staging_secs: 3600,
        }
    }
}

/// Loads `T` from a configuration file, overlaid with environment variables prefixed
/// `DEPOT__` (nested keys separated by `__`).
///
/// The file format follows its extension (`.toml`, `.yaml`, `.json`, ...); the file must
/// exist.
///
/// # Example
/// ```rust,no_run
/// use depot_storage::{ContentStoreConfig, load_config};
///
/// #[derive(serde::Deserialize)]
/// struct AppConfig {
///     storage: ContentStoreConfig,
/// }
///
/// let cfg: AppConfig = load_config("config/depot.toml")?;
/// # Ok::<(), depot_storage::StorageError>(())
/// ```
///
/// # Errors
/// [`StorageError::Config`] if the file is missing or its content does not match `T`.
pub fn load_config<T>(path: impl AsRef<Path>) -> Result<T, StorageError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();

    let builder = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .convert_case(config::Case::Snake),
        );

    info!(path = %path.display(), "Loading config");

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_values_override_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("depot.toml");
        std::fs::write(&path, "base_dir = \"/srv/depot\"\nstale_staging_secs = 60\n").unwrap();

        let cfg: ContentStoreConfig = load_config(&path).unwrap();

        assert_eq!(cfg.base_dir, PathBuf::from("/srv/depot"));
        assert_eq!(cfg.stale_staging_secs, 60);
        assert!(cfg.create);
        assert!(cfg.purge_stale_staging);
    }

    #[test]
    fn nested_sections_deserialize() {
        #[derive(Debug, Deserialize)]
        struct AppConfig {
            storage: ContentStoreConfig,
        }

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.toml");
        std::fs::write(&path, "[storage]\ncreate = false\n").unwrap();

        let cfg: AppConfig = load_config(&path).unwrap();

        assert!(!cfg.storage.create);
        assert_eq!(cfg.storage.base_dir, PathBuf::from("data"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = load_config::<ContentStoreConfig>(temp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, StorageError::Config { .. }));
    }
}
