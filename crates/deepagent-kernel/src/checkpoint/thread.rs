//! Live thread state.

use std::collections::BTreeMap;
use std::sync::Arc;

use deepagent_types::{Message, ThreadId};
use parking_lot::RwLock;

use crate::storage::ThreadRecord;
use crate::vfs::Entry;

/// One conversation: its history plus its ephemeral filesystem.
#[derive(Debug, Default)]
pub struct ThreadState {
    messages: Vec<Message>,
    files: BTreeMap<String, Entry>,
}

impl ThreadState {
    fn from_record(record: ThreadRecord) -> Self {
        Self {
            messages: record.messages,
            files: record
                .files
                .into_iter()
                .map(|entry| (entry.path.clone(), entry))
                .collect(),
        }
    }
}

/// Shared reference to a live [`ThreadState`].
///
/// Cloning the handle shares the state. The ephemeral backend holds one, so
/// its entries live exactly as long as the thread does. Locks are never held
/// across an `.await`.
#[derive(Clone)]
pub struct ThreadHandle {
    id: ThreadId,
    state: Arc<RwLock<ThreadState>>,
}

impl std::fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ThreadHandle")
            .field("id", &self.id)
            .field("messages", &state.messages.len())
            .field("files", &state.files.len())
            .finish()
    }
}

impl ThreadHandle {
    /// A fresh, empty thread that is not tracked by any checkpointer.
    ///
    /// Useful for tests and for one-off filesystems.
    pub fn detached(id: ThreadId) -> Self {
        Self::with_state(id, ThreadState::default())
    }

    pub(crate) fn from_record(id: ThreadId, record: ThreadRecord) -> Self {
        Self::with_state(id, ThreadState::from_record(record))
    }

    fn with_state(id: ThreadId, state: ThreadState) -> Self {
        Self {
            id,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn id(&self) -> &ThreadId {
        &self.id
    }

    /// Copy of the full message history.
    pub fn messages(&self) -> Vec<Message> {
        self.state.read().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.state.read().messages.len()
    }

    pub fn last_message(&self) -> Option<Message> {
        self.state.read().messages.last().cloned()
    }

    /// Copy of the ephemeral filesystem, in path order.
    pub fn files(&self) -> Vec<Entry> {
        self.state.read().files.values().cloned().collect()
    }

    /// Whether two handles share the same state.
    pub fn same_thread(&self, other: &ThreadHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Push a message, returning its sequence number.
    ///
    /// The persist callback runs under the write lock so sequence numbers
    /// reach the store in the same order they enter the history. If it
    /// fails, the message is not appended.
    pub(crate) fn push_message<E>(
        &self,
        message: Message,
        persist: impl FnOnce(u64, &Message) -> Result<(), E>,
    ) -> Result<u64, E> {
        let mut state = self.state.write();
        let seq = state.messages.len() as u64;
        persist(seq, &message)?;
        state.messages.push(message);
        Ok(seq)
    }

    pub(crate) fn read_files<R>(&self, f: impl FnOnce(&BTreeMap<String, Entry>) -> R) -> R {
        f(&self.state.read().files)
    }

    pub(crate) fn write_files<R>(&self, f: impl FnOnce(&mut BTreeMap<String, Entry>) -> R) -> R {
        f(&mut self.state.write().files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = ThreadHandle::detached(ThreadId::new("t"));
        let b = a.clone();
        b.push_message(Message::user("hi"), |_, _| Ok::<_, ()>(())).unwrap();
        assert_eq!(a.message_count(), 1);
        assert!(a.same_thread(&b));
        assert!(!a.same_thread(&ThreadHandle::detached(ThreadId::new("t"))));
    }

    #[test]
    fn failed_persist_does_not_append() {
        let handle = ThreadHandle::detached(ThreadId::new("t"));
        let result = handle.push_message(Message::user("lost"), |_, _| Err("disk full"));
        assert_eq!(result, Err("disk full"));
        assert_eq!(handle.message_count(), 0);

        let seq = handle
            .push_message(Message::user("kept"), |seq, _| {
                assert_eq!(seq, 0);
                Ok::<_, ()>(())
            })
            .unwrap();
        assert_eq!(seq, 0);
    }

    #[test]
    fn restores_from_record() {
        let record = ThreadRecord {
            messages: vec![Message::user("m1")],
            files: vec![Entry::new("/b", "2"), Entry::new("/a", "1")],
        };
        let handle = ThreadHandle::from_record(ThreadId::new("t"), record);
        assert_eq!(handle.messages()[0].content, "m1");
        let paths: Vec<String> = handle.files().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
    }
}
