//! Path normalization.
//!
//! All backends and the router see paths in one canonical form: absolute,
//! `/`-separated, no empty or `.` segments, no trailing slash (except the
//! root itself). Traversal is rejected rather than resolved, so a path can
//! never climb out of the namespace the router picked for it.

use super::error::{VfsError, VfsResult};

/// Normalize a path to canonical absolute form.
///
/// ```
/// use deepagent_kernel::vfs::normalize_path;
///
/// assert_eq!(normalize_path("notes//a.md").unwrap(), "/notes/a.md");
/// assert_eq!(normalize_path("/./x/").unwrap(), "/x");
/// assert!(normalize_path("/a/../b").is_err());
/// ```
pub fn normalize_path(raw: &str) -> VfsResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VfsError::invalid_path(raw, "path is empty"));
    }
    if trimmed.contains('\0') {
        return Err(VfsError::invalid_path(raw, "path contains a NUL byte"));
    }
    if trimmed.starts_with('~') {
        return Err(VfsError::invalid_path(raw, "home-relative paths are not allowed"));
    }

    let mut out = String::with_capacity(trimmed.len() + 1);
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(VfsError::invalid_path(raw, "path traversal (..) is not allowed")),
            s => {
                out.push('/');
                out.push_str(s);
            }
        }
    }

    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// Normalize a path that must name an entry (not the root).
pub fn normalize_file_path(raw: &str) -> VfsResult<String> {
    let path = normalize_path(raw)?;
    if path == "/" {
        return Err(VfsError::invalid_path(raw, "the root is not a file"));
    }
    Ok(path)
}

/// Whether `path` lies under the directory `dir` (both normalized).
///
/// `/sub` contains `/sub` and `/sub/c.md` but not `/subway.md`.
pub fn is_under(path: &str, dir: &str) -> bool {
    if dir == "/" {
        return true;
    }
    match path.strip_prefix(dir) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}
