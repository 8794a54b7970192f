//! Mapping of manifest relative paths to server URLs and local paths.

use std::path::{Component, Path, PathBuf};

/// Percent-encodes each `/`-separated segment of a manifest path.
///
/// Reserved characters are encoded, `/` is kept as the segment separator and
/// spaces become `%20`.
///
/// ```
/// use hfsync_core::download::encode_relative_path;
///
/// assert_eq!(encode_relative_path("docs/read me.txt"), "docs/read%20me.txt");
/// assert_eq!(encode_relative_path("a+b/c&d?.bin"), "a%2Bb/c%26d%3F.bin");
/// ```
#[must_use]
pub fn encode_relative_path(relative_path: &str) -> String {
    relative_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds the download URL of a manifest path: `base_url/<encoded path>`.
#[must_use]
pub fn remote_url(base_url: &str, relative_path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        encode_relative_path(relative_path)
    )
}

/// Canonical spelling of a manifest path: its normal components joined by `/`.
///
/// `./a.txt`, `a//b` and `a/b/` become `a.txt`, `a/b` and `a/b`, so two spellings
/// of one local file share one key. Returns `None` for absolute paths, paths
/// with a `..` component, or paths with no normal component.
///
/// ```
/// use hfsync_core::download::normalize_relative_path;
///
/// assert_eq!(normalize_relative_path("./docs//a.txt").as_deref(), Some("docs/a.txt"));
/// assert_eq!(normalize_relative_path("../a.txt"), None);
/// ```
#[must_use]
pub fn normalize_relative_path(relative_path: &str) -> Option<String> {
    let mut parts = Vec::new();
    for component in Path::new(relative_path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Returns true when `relative_path` stays inside whatever root it is joined to:
/// no absolute prefix, no `..` component, and at least one normal component.
#[must_use]
pub fn is_contained_path(relative_path: &str) -> bool {
    normalize_relative_path(relative_path).is_some()
}

/// Joins a manifest path under the destination root.
///
/// Returns `None` for paths that would land outside the root.
#[must_use]
pub fn local_path(root: &Path, relative_path: &str) -> Option<PathBuf> {
    is_contained_path(relative_path).then(|| root.join(relative_path))
}
