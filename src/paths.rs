//! Source-root relative paths and the URLs built from them.
//!
//! Filesystem paths are only ever turned into URLs through [`relative`], so
//! URLs always use `/` separators regardless of platform. Incoming URL paths
//! are only ever turned into filesystem paths through [`safe_join`], which
//! refuses anything that could escape the source root.

use std::path::{Component, Path, PathBuf};

/// URL prefix for raw source files.
pub const SOURCE_PREFIX: &str = "/_src";

/// `path` relative to `root`, `/`-separated. `""` for the root itself.
///
/// Returns `None` when `path` is not under `root`.
pub fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Join a URL prefix and a relative path with exactly one `/` between them.
///
/// ```
/// use gallery::paths::join_url;
/// assert_eq!(join_url("/", "trip/a.jpg"), "/trip/a.jpg");
/// assert_eq!(join_url("/edit", ""), "/edit");
/// assert_eq!(join_url("/", ""), "/");
/// ```
pub fn join_url(prefix: &str, rel: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let rel = rel.trim_start_matches('/');
    match (prefix.is_empty(), rel.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{rel}"),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{rel}"),
    }
}

/// Raw source URL for a path under `root`.
pub fn source_url(root: &Path, path: &Path) -> Option<String> {
    relative(root, path).map(|rel| join_url(SOURCE_PREFIX, &rel))
}

/// Resolve a `/`-separated request path under `root`.
///
/// Empty segments and `.` are ignored; `..`, absolute components and
/// backslashes are rejected.
pub fn safe_join(root: &Path, rel: &str) -> Option<PathBuf> {
    let mut out = root.to_path_buf();
    for segment in rel.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') => return None,
            s => {
                let mut components = Path::new(s).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => out.push(s),
                    _ => return None,
                }
            }
        }
    }
    Some(out)
}

/// Final path component as a string (`""` for the root).
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
