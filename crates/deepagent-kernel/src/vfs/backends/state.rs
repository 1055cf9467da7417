//! Thread-scoped ephemeral backend.

use async_trait::async_trait;

use crate::checkpoint::ThreadHandle;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::FilesystemOps;
use crate::vfs::path::{is_under, normalize_file_path, normalize_path};
use crate::vfs::pattern::{GlobPattern, LinePattern, replace_in};
use crate::vfs::types::{EditOutcome, Entry, FileInfo, GrepResult};

/// Backend whose entries belong to one thread.
///
/// Built from a live [`ThreadHandle`]; it has no storage of its own. Entries
/// reach disk only when the checkpointer snapshots the thread.
#[derive(Debug, Clone)]
pub struct StateBackend {
    thread: ThreadHandle,
}

impl StateBackend {
    pub fn new(thread: ThreadHandle) -> Self {
        Self { thread }
    }

    pub fn thread(&self) -> &ThreadHandle {
        &self.thread
    }
}

#[async_trait]
impl FilesystemOps for StateBackend {
    async fn stat(&self, path: &str) -> VfsResult<Entry> {
        let path = normalize_file_path(path)?;
        self.thread
            .read_files(|files| files.get(&path).cloned())
            .ok_or_else(|| VfsError::not_found(path))
    }

    async fn list_info(&self, prefix: &str) -> VfsResult<Vec<FileInfo>> {
        let dir = normalize_path(prefix)?;
        Ok(self.thread.read_files(|files| {
            files
                .values()
                .filter(|e| is_under(&e.path, &dir))
                .map(Entry::info)
                .collect()
        }))
    }

    async fn write(&self, path: &str, content: &str) -> VfsResult<u64> {
        let path = normalize_file_path(path)?;
        Ok(self.thread.write_files(|files| match files.get_mut(&path) {
            Some(entry) => entry.overwrite(content),
            None => {
                files.insert(path.clone(), Entry::new(path, content));
                1
            }
        }))
    }

    async fn edit(&self, path: &str, old: &str, new: &str, replace_all: bool) -> VfsResult<EditOutcome> {
        let path = normalize_file_path(path)?;
        self.thread.write_files(|files| {
            let entry = files
                .get_mut(&path)
                .ok_or_else(|| VfsError::not_found(path.as_str()))?;
            let (updated, replacements) = replace_in(&path, &entry.content, old, new, replace_all)?;
            let version = entry.overwrite(updated);
            Ok(EditOutcome {
                version,
                replacements,
            })
        })
    }

    async fn delete(&self, path: &str) -> VfsResult<()> {
        let path = normalize_file_path(path)?;
        match self.thread.write_files(|files| files.remove(&path)) {
            Some(_) => Ok(()),
            None => Err(VfsError::not_found(path)),
        }
    }

    async fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        let glob = GlobPattern::new(pattern)?;
        Ok(self.thread.read_files(|files| glob.filter(files.values())))
    }

    async fn grep(&self, pattern: &str) -> VfsResult<GrepResult> {
        let needle = LinePattern::new(pattern)?;
        Ok(self.thread.read_files(|files| needle.search_entries(files.values())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepagent_types::ThreadId;

    fn backend() -> StateBackend {
        StateBackend::new(ThreadHandle::detached(ThreadId::new("t")))
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let fs = backend();
        assert!(matches!(fs.read("/a.md").await, Err(VfsError::NotFound { .. })));

        assert_eq!(fs.write("/a.md", "hello").await.unwrap(), 1);
        assert_eq!(fs.read("a.md").await.unwrap(), "hello");
        assert_eq!(fs.write("//a.md", "again").await.unwrap(), 2);
        assert_eq!(fs.read("/a.md").await.unwrap(), "again");
    }

    #[tokio::test]
    async fn entries_live_in_the_thread() {
        let handle = ThreadHandle::detached(ThreadId::new("t"));
        let fs = StateBackend::new(handle.clone());
        fs.write("/notes/x.md", "x").await.unwrap();
        assert_eq!(handle.files().len(), 1);

        let other = StateBackend::new(ThreadHandle::detached(ThreadId::new("u")));
        assert!(other.read("/notes/x.md").await.is_err());
    }

    #[tokio::test]
    async fn edit_is_exactly_once() {
        let fs = backend();
        fs.write("/f.txt", "one two two").await.unwrap();

        let err = fs.edit("/f.txt", "two", "2", false).await.unwrap_err();
        assert_eq!(err, VfsError::no_match("/f.txt", 2));
        let err = fs.edit("/f.txt", "three", "3", false).await.unwrap_err();
        assert_eq!(err, VfsError::no_match("/f.txt", 0));
        assert_eq!(fs.read("/f.txt").await.unwrap(), "one two two");
        assert_eq!(fs.stat("/f.txt").await.unwrap().version, 1);

        let outcome = fs.edit("/f.txt", "one", "1", false).await.unwrap();
        assert_eq!(outcome, EditOutcome { version: 2, replacements: 1 });
        let outcome = fs.edit("/f.txt", "two", "2", true).await.unwrap();
        assert_eq!(outcome.replacements, 2);
        assert_eq!(fs.read("/f.txt").await.unwrap(), "1 2 2");

        assert!(matches!(
            fs.edit("/missing", "a", "b", false).await,
            Err(VfsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn double_delete_is_an_error() {
        let fs = backend();
        fs.write("/x", "1").await.unwrap();
        fs.delete("/x").await.unwrap();
        assert_eq!(fs.delete("/x").await, Err(VfsError::not_found("/x")));
        assert!(!fs.exists("/x").await.unwrap());
    }

    #[tokio::test]
    async fn list_is_lexicographic_and_directory_scoped() {
        let fs = backend();
        for p in ["/sub/c.md", "/b.txt", "/a.md", "/subway.md"] {
            fs.write(p, p).await.unwrap();
        }
        assert_eq!(
            fs.list("/").await.unwrap(),
            vec!["/a.md", "/b.txt", "/sub/c.md", "/subway.md"]
        );
        assert_eq!(fs.list("/sub/").await.unwrap(), vec!["/sub/c.md"]);
        assert!(fs.list("/nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn root_and_traversal_are_invalid() {
        let fs = backend();
        assert!(matches!(fs.write("/", "x").await, Err(VfsError::InvalidPath { .. })));
        assert!(matches!(fs.read("/a/../b").await, Err(VfsError::InvalidPath { .. })));
    }

    #[tokio::test]
    async fn glob_and_grep() {
        let fs = backend();
        fs.write("/a.md", "content here\nnone\ncontent again").await.unwrap();
        fs.write("/b.txt", "nothing").await.unwrap();
        fs.write("/sub/c.md", "").await.unwrap();

        assert_eq!(fs.glob("*.md").await.unwrap(), vec!["/a.md"]);
        assert_eq!(fs.glob("**/*.md").await.unwrap(), vec!["/a.md", "/sub/c.md"]);

        let hits = fs.grep("content").await.unwrap();
        assert_eq!(hits.len(), 1);
        let lines: Vec<usize> = hits["/a.md"].iter().map(|m| m.line).collect();
        assert_eq!(lines, vec![1, 3]);
    }
}
