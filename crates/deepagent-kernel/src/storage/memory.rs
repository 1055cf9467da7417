//! Process-lifetime store.

use std::collections::BTreeMap;

use dashmap::DashMap;
use deepagent_types::{CollectionId, Message, ThreadId};

use super::{CheckpointStore, EntryStore, StorageError, StorageResult, ThreadRecord};
use crate::vfs::Entry;

/// In-memory [`EntryStore`] and [`CheckpointStore`].
///
/// Writes to one collection or thread are serialized by the map shard lock.
/// Everything is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<CollectionId, BTreeMap<String, Entry>>,
    threads: DashMap<ThreadId, ThreadRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntryStore for MemoryStore {
    fn get(&self, collection: &CollectionId, path: &str) -> StorageResult<Option<Entry>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|entries| entries.get(path).cloned()))
    }

    fn put(&self, collection: &CollectionId, path: &str, content: &str) -> StorageResult<u64> {
        let mut entries = self.collections.entry(collection.clone()).or_default();
        match entries.get_mut(path) {
            Some(entry) => Ok(entry.overwrite(content)),
            None => {
                entries.insert(path.to_string(), Entry::new(path, content));
                Ok(1)
            }
        }
    }

    fn remove(&self, collection: &CollectionId, path: &str) -> StorageResult<bool> {
        Ok(self
            .collections
            .get_mut(collection)
            .map(|mut entries| entries.remove(path).is_some())
            .unwrap_or(false))
    }

    fn entries(&self, collection: &CollectionId, prefix: &str) -> StorageResult<Vec<Entry>> {
        let Some(entries) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

impl CheckpointStore for MemoryStore {
    fn load_thread(&self, thread_id: &ThreadId) -> StorageResult<Option<ThreadRecord>> {
        Ok(self.threads.get(thread_id).map(|record| record.value().clone()))
    }

    fn create_thread(&self, thread_id: &ThreadId) -> StorageResult<()> {
        self.threads.entry(thread_id.clone()).or_default();
        Ok(())
    }

    fn append_message(&self, thread_id: &ThreadId, seq: u64, message: &Message) -> StorageResult<()> {
        let mut record = self
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StorageError::Other(format!("no such thread: {thread_id}")))?;
        let expected = record.messages.len() as u64;
        if seq != expected {
            return Err(StorageError::Other(format!(
                "out-of-order append to {thread_id}: seq {seq}, expected {expected}"
            )));
        }
        record.messages.push(message.clone());
        Ok(())
    }

    fn save_files(&self, thread_id: &ThreadId, files: &[Entry]) -> StorageResult<()> {
        let mut record = self
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StorageError::Other(format!("no such thread: {thread_id}")))?;
        record.files = files.to_vec();
        record.files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(())
    }

    fn delete_thread(&self, thread_id: &ThreadId) -> StorageResult<bool> {
        Ok(self.threads.remove(thread_id).is_some())
    }

    fn list_threads(&self) -> StorageResult<Vec<ThreadId>> {
        let mut ids: Vec<ThreadId> = self.threads.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_bumps_versions_per_collection() {
        let store = MemoryStore::new();
        let a = CollectionId::new("a");
        let b = CollectionId::new("b");

        assert_eq!(store.put(&a, "/x", "1").unwrap(), 1);
        assert_eq!(store.put(&a, "/x", "2").unwrap(), 2);
        assert_eq!(store.put(&b, "/x", "other").unwrap(), 1);

        assert_eq!(store.get(&a, "/x").unwrap().unwrap().content, "2");
        assert_eq!(store.get(&b, "/x").unwrap().unwrap().content, "other");
        assert!(store.get(&a, "/missing").unwrap().is_none());
    }

    #[test]
    fn entries_by_prefix_in_order() {
        let store = MemoryStore::new();
        let c = CollectionId::default();
        for path in ["/m/b", "/m/a", "/n/c", "/ma"] {
            store.put(&c, path, path).unwrap();
        }
        let paths: Vec<String> = store
            .entries(&c, "/m/")
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec!["/m/a", "/m/b"]);
        assert_eq!(store.entries(&c, "/").unwrap().len(), 4);
        assert!(store.entries(&CollectionId::new("empty"), "/").unwrap().is_empty());
    }

    #[test]
    fn remove_reports_presence() {
        let store = MemoryStore::new();
        let c = CollectionId::default();
        store.put(&c, "/x", "1").unwrap();
        assert!(store.remove(&c, "/x").unwrap());
        assert!(!store.remove(&c, "/x").unwrap());
    }

    #[test]
    fn thread_appends_must_be_in_order() {
        let store = MemoryStore::new();
        let t = ThreadId::new("t");
        assert!(store.append_message(&t, 0, &Message::user("early")).is_err());

        store.create_thread(&t).unwrap();
        store.append_message(&t, 0, &Message::user("one")).unwrap();
        assert!(store.append_message(&t, 5, &Message::user("gap")).is_err());
        store.append_message(&t, 1, &Message::assistant("two")).unwrap();

        let record = store.load_thread(&t).unwrap().unwrap();
        assert_eq!(record.messages.len(), 2);
        assert_eq!(store.list_threads().unwrap(), vec![t.clone()]);
        assert!(store.delete_thread(&t).unwrap());
        assert!(store.load_thread(&t).unwrap().is_none());
    }
}
