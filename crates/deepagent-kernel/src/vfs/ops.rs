//! Filesystem operations trait.

use async_trait::async_trait;

use super::error::VfsResult;
use super::types::{EditOutcome, Entry, FileInfo, GrepResult};

/// The capability set every backend provides.
///
/// Paths may be passed in any form [`normalize_path`](super::normalize_path)
/// accepts; implementations normalize before touching storage. The router
/// passes paths through unchanged, so a backend mounted at `/memories/` sees
/// `/memories/note.md`, not `/note.md`.
///
/// Concurrent writers to the same path are serialized per entry and the last
/// one wins. Versions are diagnostic, not a compare-and-swap guard.
#[async_trait]
pub trait FilesystemOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Full entry at `path`, or `NotFound`.
    async fn stat(&self, path: &str) -> VfsResult<Entry>;

    /// Content at `path`, or `NotFound`.
    async fn read(&self, path: &str) -> VfsResult<String> {
        Ok(self.stat(path).await?.content)
    }

    /// Entries under the directory `prefix`, in path order.
    ///
    /// A prefix that matches nothing yields an empty list, not an error.
    async fn list_info(&self, prefix: &str) -> VfsResult<Vec<FileInfo>>;

    /// Paths under the directory `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> VfsResult<Vec<String>> {
        Ok(self
            .list_info(prefix)
            .await?
            .into_iter()
            .map(|info| info.path)
            .collect())
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Create or overwrite. Returns the new version.
    async fn write(&self, path: &str, content: &str) -> VfsResult<u64>;

    /// Replace `old` with `new` in the entry at `path`.
    ///
    /// Without `replace_all`, `old` must occur exactly once or the edit fails
    /// with `NoMatch` and the entry is left unchanged.
    async fn edit(&self, path: &str, old: &str, new: &str, replace_all: bool) -> VfsResult<EditOutcome>;

    /// Remove the entry. Deleting a missing path is `NotFound`, including a
    /// second delete of the same path.
    async fn delete(&self, path: &str) -> VfsResult<()>;

    // ========================================================================
    // Searching
    // ========================================================================

    /// Paths matching a shell-style pattern, in lexicographic order.
    async fn glob(&self, pattern: &str) -> VfsResult<Vec<String>>;

    /// Lines matching `pattern` in every entry, keyed by path.
    async fn grep(&self, pattern: &str) -> VfsResult<GrepResult>;

    // ========================================================================
    // Convenience (default implementations)
    // ========================================================================

    /// Whether an entry exists at `path`.
    async fn exists(&self, path: &str) -> VfsResult<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(super::VfsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
