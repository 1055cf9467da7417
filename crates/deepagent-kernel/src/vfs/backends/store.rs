//! Durable backend over a shared entry store.

use std::sync::Arc;

use async_trait::async_trait;
use deepagent_types::CollectionId;

use crate::storage::EntryStore;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::FilesystemOps;
use crate::vfs::path::{is_under, normalize_file_path, normalize_path};
use crate::vfs::pattern::{GlobPattern, LinePattern, replace_in};
use crate::vfs::types::{EditOutcome, Entry, FileInfo, GrepResult};

/// Backend whose entries outlive any thread.
///
/// Every thread that mounts the same collection sees the same entries.
/// Edits are read-modify-write against the store; a concurrent write between
/// the read and the write is overwritten (last writer wins).
#[derive(Clone)]
pub struct StoreBackend {
    collection: CollectionId,
    store: Arc<dyn EntryStore>,
}

impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBackend")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl StoreBackend {
    pub fn new(store: Arc<dyn EntryStore>, collection: CollectionId) -> Self {
        Self { collection, store }
    }

    pub fn collection(&self) -> &CollectionId {
        &self.collection
    }

    fn all_entries(&self) -> VfsResult<Vec<Entry>> {
        Ok(self.store.entries(&self.collection, "/")?)
    }
}

#[async_trait]
impl FilesystemOps for StoreBackend {
    async fn stat(&self, path: &str) -> VfsResult<Entry> {
        let path = normalize_file_path(path)?;
        self.store
            .get(&self.collection, &path)?
            .ok_or_else(|| VfsError::not_found(path))
    }

    async fn list_info(&self, prefix: &str) -> VfsResult<Vec<FileInfo>> {
        let dir = normalize_path(prefix)?;
        let entries = self.store.entries(&self.collection, &dir)?;
        Ok(entries
            .iter()
            .filter(|e| is_under(&e.path, &dir))
            .map(Entry::info)
            .collect())
    }

    async fn write(&self, path: &str, content: &str) -> VfsResult<u64> {
        let path = normalize_file_path(path)?;
        let version = self.store.put(&self.collection, &path, content)?;
        tracing::debug!(collection = %self.collection, path = %path, version, "durable write");
        Ok(version)
    }

    async fn edit(&self, path: &str, old: &str, new: &str, replace_all: bool) -> VfsResult<EditOutcome> {
        let path = normalize_file_path(path)?;
        let current = self
            .store
            .get(&self.collection, &path)?
            .ok_or_else(|| VfsError::not_found(path.as_str()))?;
        let (updated, replacements) = replace_in(&path, &current.content, old, new, replace_all)?;
        let version = self.store.put(&self.collection, &path, &updated)?;
        Ok(EditOutcome {
            version,
            replacements,
        })
    }

    async fn delete(&self, path: &str) -> VfsResult<()> {
        let path = normalize_file_path(path)?;
        if self.store.remove(&self.collection, &path)? {
            Ok(())
        } else {
            Err(VfsError::not_found(path))
        }
    }

    async fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        let glob = GlobPattern::new(pattern)?;
        Ok(glob.filter(&self.all_entries()?))
    }

    async fn grep(&self, pattern: &str) -> VfsResult<GrepResult> {
        let needle = LinePattern::new(pattern)?;
        Ok(needle.search_entries(&self.all_entries()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SqliteStore};

    fn backend_over(store: Arc<dyn EntryStore>) -> StoreBackend {
        StoreBackend::new(store, CollectionId::default())
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store: Arc<dyn EntryStore> = Arc::new(MemoryStore::new());
        let a = StoreBackend::new(store.clone(), CollectionId::new("a"));
        let b = StoreBackend::new(store, CollectionId::new("b"));

        a.write("/memories/note.md", "x").await.unwrap();
        assert_eq!(a.read("/memories/note.md").await.unwrap(), "x");
        assert!(matches!(
            b.read("/memories/note.md").await,
            Err(VfsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn shared_collection_is_shared() {
        let store: Arc<dyn EntryStore> = Arc::new(MemoryStore::new());
        let first = backend_over(store.clone());
        let second = backend_over(store);
        first.write("/memories/n.md", "from first").await.unwrap();
        assert_eq!(second.read("/memories/n.md").await.unwrap(), "from first");
    }

    #[tokio::test]
    async fn contract_over_sqlite() {
        let fs = backend_over(Arc::new(SqliteStore::in_memory().unwrap()));

        assert_eq!(fs.write("/m/a.md", "some content\nx\ncontent").await.unwrap(), 1);
        assert_eq!(fs.write("/m/b.txt", "nope").await.unwrap(), 1);
        assert_eq!(fs.write("/m/a.md", "content\nx\ncontent").await.unwrap(), 2);

        let err = fs.edit("/m/a.md", "content", "C", false).await.unwrap_err();
        assert_eq!(err, VfsError::no_match("/m/a.md", 2));
        let outcome = fs.edit("/m/a.md", "x", "y", false).await.unwrap();
        assert_eq!(outcome.version, 3);

        assert_eq!(fs.list("/m").await.unwrap(), vec!["/m/a.md", "/m/b.txt"]);
        assert_eq!(fs.glob("/m/*.md").await.unwrap(), vec!["/m/a.md"]);
        let hits = fs.grep("content").await.unwrap();
        assert_eq!(hits["/m/a.md"].len(), 2);
        assert!(!hits.contains_key("/m/b.txt"));

        fs.delete("/m/b.txt").await.unwrap();
        assert!(matches!(fs.delete("/m/b.txt").await, Err(VfsError::NotFound { .. })));
    }
}
