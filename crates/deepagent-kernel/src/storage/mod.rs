//! Keyed persistence underneath the durable backend and the checkpointer.
//!
//! Two narrow traits, each keyed by a composite of an owner id and a path or
//! sequence number:
//!
//! - [`EntryStore`]: durable entries by `(collection_id, path)`
//! - [`CheckpointStore`]: thread history and ephemeral file snapshots by
//!   `thread_id`
//!
//! [`MemoryStore`] lives as long as the process. [`SqliteStore`] survives
//! restarts. Both implement both traits so one handle can back a whole agent.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use deepagent_types::{CollectionId, Message, ThreadId};
use thiserror::Error;

use crate::vfs::{Entry, VfsError};

/// Storage-layer failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for VfsError {
    fn from(e: StorageError) -> Self {
        VfsError::storage(e)
    }
}

/// Everything persisted for one thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadRecord {
    /// In append order.
    pub messages: Vec<Message>,
    /// Last snapshot of the thread's ephemeral filesystem, in path order.
    pub files: Vec<Entry>,
}

/// Durable entries, namespaced by collection.
pub trait EntryStore: Send + Sync {
    fn get(&self, collection: &CollectionId, path: &str) -> StorageResult<Option<Entry>>;

    /// Create or overwrite; returns the new version (1 on create).
    ///
    /// The version bump is atomic with the write.
    fn put(&self, collection: &CollectionId, path: &str, content: &str) -> StorageResult<u64>;

    /// Returns whether an entry was removed.
    fn remove(&self, collection: &CollectionId, path: &str) -> StorageResult<bool>;

    /// Entries whose path starts with `prefix` (plain string prefix), in
    /// path order.
    fn entries(&self, collection: &CollectionId, prefix: &str) -> StorageResult<Vec<Entry>>;
}

/// Thread state, keyed by thread id.
pub trait CheckpointStore: Send + Sync {
    fn load_thread(&self, thread_id: &ThreadId) -> StorageResult<Option<ThreadRecord>>;

    /// Register an empty thread. No-op if it already exists.
    fn create_thread(&self, thread_id: &ThreadId) -> StorageResult<()>;

    /// Persist message number `seq` (0-based position in the history).
    fn append_message(&self, thread_id: &ThreadId, seq: u64, message: &Message) -> StorageResult<()>;

    /// Replace the thread's file snapshot.
    fn save_files(&self, thread_id: &ThreadId, files: &[Entry]) -> StorageResult<()>;

    /// Returns whether the thread existed.
    fn delete_thread(&self, thread_id: &ThreadId) -> StorageResult<bool>;

    fn list_threads(&self) -> StorageResult<Vec<ThreadId>>;
}
