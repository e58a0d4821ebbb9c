use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Removes per-request staging trees whose newest entry is at least `threshold` old.
///
/// Three-character names are shard directories, never request ids, and are left alone.
pub(crate) async fn purge_stale_staging(staging_root: &Path, threshold: Duration) {
    let root = staging_root.to_path_buf();
    let now = SystemTime::now();

    match tokio::task::spawn_blocking(move || remove_stale(&root, now, threshold)).await {
        Ok((removed, failed)) if removed > 0 || failed > 0 => {
            info!(removed, failed, "Cleaned up abandoned staging areas");
        },
        Err(e) => {
            error!(error = %e, "Staging cleanup task panicked");
        },
        _ => {},
    }
}

fn remove_stale(root: &Path, now: SystemTime, threshold: Duration) -> (usize, usize) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return (0, 0);
    };

    let mut removed = 0;
    let mut failed = 0;

    for entry in entries.flatten() {
        let path = entry.path();
        let is_request_dir = entry.file_type().is_ok_and(|t| t.is_dir())
            && entry.file_name().to_str().is_some_and(|n| n.chars().count() != 3);
        if !is_request_dir || !is_stale(&path, now, threshold) {
            continue;
        }

        match std::fs::remove_dir_all(&path) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove stale staging area");
                failed += 1;
            },
        }
    }

    (removed, failed)
}

/// A tree is stale when its most recently modified entry is at least `threshold` old.
fn is_stale(dir: &Path, now: SystemTime, threshold: Duration) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.metadata().ok())
        .filter_map(|m| m.modified().ok())
        .max()
        .and_then(|newest| now.duration_since(newest).ok())
        .is_none_or(|age| age >= threshold)
}
