//! Deterministic directory layout for content identifiers.
//!
//! Every id maps to `<id[0:3]>/<id[3:6]>/<padded id>[/<qualifier>]`, where ids shorter
//! than six characters are right-padded with `'0'`. Two three-character fan-out levels
//! keep directory sizes bounded well past legacy per-directory entry limits. The same
//! mapping is used for staging, the permanent store, and deletion lookups.

use crate::item::ContentUri;
use crate::security::is_blank;
use std::path::{Path, PathBuf};

const SHARD_WIDTH: usize = 3;
const PADDED_LEN: usize = SHARD_WIDTH * 2;
const PAD_CHAR: char = '0';

/// Path segments for `(id, qualifier)`: three for a primary item, four when the
/// qualifier is non-blank.
///
/// # Example
///
/// ```rust
/// use depot_storage::shard_path;
///
/// assert_eq!(shard_path("AB", ""), ["AB0", "000", "AB0000"]);
/// assert_eq!(shard_path("abc123", "preview"), ["abc", "123", "abc123", "preview"]);
/// ```
#[must_use]
pub fn shard_path(id: &str, qualifier: &str) -> Vec<String> {
    let mut padded: String = id.to_owned();
    let len = padded.chars().count();
    if len < PADDED_LEN {
        padded.extend(std::iter::repeat_n(PAD_CHAR, PADDED_LEN - len));
    }

    let first: String = padded.chars().take(SHARD_WIDTH).collect();
    let second: String = padded.chars().skip(SHARD_WIDTH).take(SHARD_WIDTH).collect();

    let mut segments = Vec::with_capacity(4);
    segments.push(first);
    segments.push(second);
    segments.push(padded);
    if !is_blank(qualifier) {
        segments.push(qualifier.to_owned());
    }
    segments
}

/// Joins the shard segments of `uri` onto `root`.
pub(crate) fn shard_dir(root: &Path, uri: &ContentUri) -> PathBuf {
    let mut dir = root.to_path_buf();
    dir.extend(shard_path(uri.id(), uri.qualifier()));
    dir
}
