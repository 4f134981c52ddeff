// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher and caches.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(normalize(&rel.to_string_lossy()));
    }

    // macOS reports /private/var/... for /var/..., among others.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(normalize(&rel.to_string_lossy()));
        }
    }

    None
}

/// Join two relative path fragments with a single `/`, dropping empty parts.
pub fn join_relative(dir: &str, name: &str) -> String {
    let joined = format!("{}/{}", dir.trim_matches('/'), name.trim_matches('/'));
    normalize(&joined)
}

/// Forward slashes, no leading/trailing `/`, no `.` or empty components.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// `candidate` equals `prefix` or lies below it (component-wise).
pub fn is_same_or_descendant(candidate: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    candidate == prefix
        || candidate
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
