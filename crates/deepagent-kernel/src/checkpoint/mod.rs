//! Thread checkpointer.
//!
//! Tracks every thread touched in this process and writes history through
//! to a [`CheckpointStore`] as it grows:
//!
//! ```text
//! create_or_resume(id) ──► Active ──► append(msg) ──► Active
//!                            │                          │
//!                            └──────── snapshot() ◄─────┘
//! ```
//!
//! There is no terminal state from inside a session. [`Checkpointer::purge`]
//! is the only destructor.

mod thread;

pub use thread::{ThreadHandle, ThreadState};

use std::sync::Arc;

use dashmap::DashMap;
use deepagent_types::{Message, ThreadId};
use tracing::{debug, info};

use crate::error::{AgentError, AgentResult};
use crate::storage::{CheckpointStore, MemoryStore};

/// Persists and restores thread state keyed by thread id.
pub struct Checkpointer {
    store: Arc<dyn CheckpointStore>,
    live: DashMap<ThreadId, ThreadHandle>,
}

impl std::fmt::Debug for Checkpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpointer")
            .field("live", &self.live.len())
            .finish_non_exhaustive()
    }
}

impl Checkpointer {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            store,
            live: DashMap::new(),
        }
    }

    /// Checkpointer over a fresh [`MemoryStore`]; nothing survives the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Return the thread's live state, loading it from the store or
    /// creating it empty on first use.
    pub fn create_or_resume(&self, thread_id: &ThreadId) -> AgentResult<ThreadHandle> {
        if let Some(handle) = self.live.get(thread_id) {
            return Ok(handle.clone());
        }

        let handle = match self.store.load_thread(thread_id)? {
            Some(record) => {
                info!(
                    thread_id = %thread_id,
                    messages = record.messages.len(),
                    files = record.files.len(),
                    "resumed thread"
                );
                ThreadHandle::from_record(thread_id.clone(), record)
            }
            None => {
                self.store.create_thread(thread_id)?;
                info!(thread_id = %thread_id, "created thread");
                ThreadHandle::detached(thread_id.clone())
            }
        };

        // Another caller may have resumed the same id meanwhile; first one wins.
        Ok(self
            .live
            .entry(thread_id.clone())
            .or_insert(handle)
            .clone())
    }

    /// Append to the thread's history, writing through to the store.
    ///
    /// Returns the message's sequence number.
    pub fn append(&self, thread_id: &ThreadId, message: Message) -> AgentResult<u64> {
        let handle = self.live_handle(thread_id)?;
        let seq = handle.push_message(message, |seq, msg| {
            self.store.append_message(thread_id, seq, msg)
        })?;
        debug!(thread_id = %thread_id, seq, "appended message");
        Ok(seq)
    }

    /// Persist the thread's ephemeral filesystem.
    pub fn snapshot(&self, thread_id: &ThreadId) -> AgentResult<()> {
        let handle = self.live_handle(thread_id)?;
        let files = handle.files();
        self.store.save_files(thread_id, &files)?;
        debug!(thread_id = %thread_id, files = files.len(), "snapshot saved");
        Ok(())
    }

    /// Full history of a live thread.
    pub fn history(&self, thread_id: &ThreadId) -> AgentResult<Vec<Message>> {
        Ok(self.live_handle(thread_id)?.messages())
    }

    /// History of any thread, live or only persisted, without resuming it.
    ///
    /// An unknown id has an empty history and is not registered.
    pub fn load_history(&self, thread_id: &ThreadId) -> AgentResult<Vec<Message>> {
        if let Some(handle) = self.handle(thread_id) {
            return Ok(handle.messages());
        }
        Ok(self
            .store
            .load_thread(thread_id)?
            .map(|record| record.messages)
            .unwrap_or_default())
    }

    /// Live handle, if the thread was resumed in this process.
    pub fn handle(&self, thread_id: &ThreadId) -> Option<ThreadHandle> {
        self.live.get(thread_id).map(|h| h.clone())
    }

    pub fn is_active(&self, thread_id: &ThreadId) -> bool {
        self.live.contains_key(thread_id)
    }

    /// Drop the in-memory handle. Persisted state is kept; the next
    /// `create_or_resume` reloads it from the store.
    pub fn release(&self, thread_id: &ThreadId) -> bool {
        self.live.remove(thread_id).is_some()
    }

    /// Destroy a thread: forget it here and delete it from the store.
    pub fn purge(&self, thread_id: &ThreadId) -> AgentResult<bool> {
        let was_live = self.live.remove(thread_id).is_some();
        let was_stored = self.store.delete_thread(thread_id)?;
        info!(thread_id = %thread_id, "purged thread");
        Ok(was_live || was_stored)
    }

    /// Every thread the store knows about.
    pub fn list_threads(&self) -> AgentResult<Vec<ThreadId>> {
        Ok(self.store.list_threads()?)
    }

    fn live_handle(&self, thread_id: &ThreadId) -> AgentResult<ThreadHandle> {
        self.handle(thread_id)
            .ok_or_else(|| AgentError::unknown_thread(thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use crate::vfs::Entry;

    #[test]
    fn append_requires_create_or_resume() {
        let cp = Checkpointer::in_memory();
        let t = ThreadId::new("t");
        let err = cp.append(&t, Message::user("hi")).unwrap_err();
        assert!(matches!(err, AgentError::UnknownThread { .. }));

        cp.create_or_resume(&t).unwrap();
        assert_eq!(cp.append(&t, Message::user("hi")).unwrap(), 0);
        assert_eq!(cp.append(&t, Message::assistant("hello")).unwrap(), 1);
    }

    #[test]
    fn resume_returns_same_live_state() {
        let cp = Checkpointer::in_memory();
        let t = ThreadId::new("t");
        let a = cp.create_or_resume(&t).unwrap();
        let b = cp.create_or_resume(&t).unwrap();
        assert!(a.same_thread(&b));
    }

    #[test]
    fn released_thread_reloads_history() {
        let cp = Checkpointer::in_memory();
        let t = ThreadId::new("t");
        cp.create_or_resume(&t).unwrap();
        cp.append(&t, Message::user("m1")).unwrap();

        assert!(cp.release(&t));
        assert!(matches!(
            cp.append(&t, Message::user("m2")),
            Err(AgentError::UnknownThread { .. })
        ));

        let handle = cp.create_or_resume(&t).unwrap();
        let history = handle.messages();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "m1");
        assert_eq!(cp.append(&t, Message::user("m2")).unwrap(), 1);
    }

    #[test]
    fn history_and_files_survive_a_new_checkpointer() {
        let store: Arc<SqliteStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let t = ThreadId::new("t");
        {
            let cp = Checkpointer::new(store.clone());
            let handle = cp.create_or_resume(&t).unwrap();
            cp.append(&t, Message::user("m1")).unwrap();
            handle.write_files(|files| {
                files.insert("/scratch.md".into(), Entry::new("/scratch.md", "y"));
            });
            cp.snapshot(&t).unwrap();
        }

        let cp = Checkpointer::new(store);
        let handle = cp.create_or_resume(&t).unwrap();
        assert_eq!(handle.messages()[0].content, "m1");
        assert_eq!(handle.files()[0].path, "/scratch.md");
    }

    #[test]
    fn load_history_does_not_register_threads() {
        let store: Arc<SqliteStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let t = ThreadId::new("t");
        {
            let cp = Checkpointer::new(store.clone());
            cp.create_or_resume(&t).unwrap();
            cp.append(&t, Message::user("m1")).unwrap();
        }

        let cp = Checkpointer::new(store);
        assert_eq!(cp.load_history(&t).unwrap()[0].content, "m1");
        assert!(!cp.is_active(&t));

        let unknown = ThreadId::new("never-seen");
        assert!(cp.load_history(&unknown).unwrap().is_empty());
        assert!(!cp.is_active(&unknown));
        assert_eq!(cp.list_threads().unwrap(), vec![t]);
    }

    #[test]
    fn purge_forgets_everything() {
        let cp = Checkpointer::in_memory();
        let t = ThreadId::new("t");
        cp.create_or_resume(&t).unwrap();
        cp.append(&t, Message::user("m1")).unwrap();
        assert_eq!(cp.list_threads().unwrap(), vec![t.clone()]);

        assert!(cp.purge(&t).unwrap());
        assert!(!cp.is_active(&t));
        assert!(cp.list_threads().unwrap().is_empty());
        assert!(cp.create_or_resume(&t).unwrap().messages().is_empty());
        assert!(!Checkpointer::in_memory().purge(&t).unwrap());
    }
}
