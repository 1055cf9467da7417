//! SQLite persistence for durable entries and thread checkpoints.
//!
//! One connection behind a mutex. Every multi-row write runs in a
//! transaction; versions are bumped inside the same statement that writes
//! the content.

use std::path::Path;
use std::time::Duration;

use deepagent_types::{CollectionId, Message, Role, ThreadId, ToolCall, now_millis};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use super::{CheckpointStore, EntryStore, StorageError, StorageResult, ThreadRecord};
use crate::vfs::Entry;

const SCHEMA: &str = r#"
-- Threads (one row per conversation)
CREATE TABLE IF NOT EXISTS threads (
    thread_id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Message history, append-only
CREATE TABLE IF NOT EXISTS messages (
    thread_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    tool_calls TEXT,
    tool_call_id TEXT,
    is_error INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (thread_id, seq),
    FOREIGN KEY (thread_id) REFERENCES threads(thread_id) ON DELETE CASCADE
);

-- Ephemeral filesystem snapshot per thread
CREATE TABLE IF NOT EXISTS thread_files (
    thread_id TEXT NOT NULL,
    path TEXT NOT NULL,
    content TEXT NOT NULL,
    version INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    modified_at INTEGER NOT NULL,
    PRIMARY KEY (thread_id, path),
    FOREIGN KEY (thread_id) REFERENCES threads(thread_id) ON DELETE CASCADE
);

-- Durable entries, shared across threads
CREATE TABLE IF NOT EXISTS store_entries (
    collection_id TEXT NOT NULL,
    path TEXT NOT NULL,
    content TEXT NOT NULL,
    version INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    modified_at INTEGER NOT NULL,
    PRIMARY KEY (collection_id, path)
);
"#;

// =============================================================================
// Row Structs (module-private helpers)
// =============================================================================

#[derive(Debug)]
struct MessageRow {
    role: String,
    content: String,
    tool_calls: Option<String>,
    tool_call_id: Option<String>,
    is_error: bool,
    created_at: u64,
}

impl MessageRow {
    fn into_message(self) -> StorageResult<Message> {
        let tool_calls: Vec<ToolCall> = match self.tool_calls {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        let role = Role::from_str(&self.role)
            .ok_or_else(|| StorageError::Other(format!("unknown role {:?}", self.role)))?;
        Ok(Message {
            role,
            content: self.content,
            tool_calls,
            tool_call_id: self.tool_call_id,
            is_error: self.is_error,
            created_at: self.created_at,
        })
    }
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        path: row.get(0)?,
        content: row.get(1)?,
        version: row.get::<_, i64>(2)? as u64,
        created_at: row.get::<_, i64>(3)? as u64,
        modified_at: row.get::<_, i64>(4)? as u64,
    })
}

/// SQLite-backed [`EntryStore`] and [`CheckpointStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a database file, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

// =============================================================================
// Durable entries
// =============================================================================

impl EntryStore for SqliteStore {
    fn get(&self, collection: &CollectionId, path: &str) -> StorageResult<Option<Entry>> {
        let conn = self.conn.lock();
        let entry = conn
            .query_row(
                "SELECT path, content, version, created_at, modified_at
                 FROM store_entries WHERE collection_id = ?1 AND path = ?2",
                params![collection.as_str(), path],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn put(&self, collection: &CollectionId, path: &str, content: &str) -> StorageResult<u64> {
        let conn = self.conn.lock();
        let version: i64 = conn.query_row(
            "INSERT INTO store_entries (collection_id, path, content, version, created_at, modified_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)
             ON CONFLICT (collection_id, path) DO UPDATE SET
                content = excluded.content,
                version = store_entries.version + 1,
                modified_at = excluded.modified_at
             RETURNING version",
            params![collection.as_str(), path, content, now_millis() as i64],
            |row| row.get(0),
        )?;
        Ok(version as u64)
    }

    fn remove(&self, collection: &CollectionId, path: &str) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM store_entries WHERE collection_id = ?1 AND path = ?2",
            params![collection.as_str(), path],
        )?;
        Ok(removed > 0)
    }

    fn entries(&self, collection: &CollectionId, prefix: &str) -> StorageResult<Vec<Entry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT path, content, version, created_at, modified_at
             FROM store_entries
             WHERE collection_id = ?1 AND substr(path, 1, length(?2)) = ?2
             ORDER BY path",
        )?;
        let entries = stmt
            .query_map(params![collection.as_str(), prefix], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

// =============================================================================
// Thread checkpoints
// =============================================================================

impl CheckpointStore for SqliteStore {
    fn load_thread(&self, thread_id: &ThreadId) -> StorageResult<Option<ThreadRecord>> {
        let conn = self.conn.lock();
        let exists = conn
            .query_row(
                "SELECT 1 FROM threads WHERE thread_id = ?1",
                params![thread_id.as_str()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            "SELECT role, content, tool_calls, tool_call_id, is_error, created_at
             FROM messages WHERE thread_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![thread_id.as_str()], |row| {
                Ok(MessageRow {
                    role: row.get(0)?,
                    content: row.get(1)?,
                    tool_calls: row.get(2)?,
                    tool_call_id: row.get(3)?,
                    is_error: row.get::<_, i64>(4)? != 0,
                    created_at: row.get::<_, i64>(5)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let messages = rows
            .into_iter()
            .map(MessageRow::into_message)
            .collect::<StorageResult<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT path, content, version, created_at, modified_at
             FROM thread_files WHERE thread_id = ?1 ORDER BY path",
        )?;
        let files = stmt
            .query_map(params![thread_id.as_str()], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ThreadRecord { messages, files }))
    }

    fn create_thread(&self, thread_id: &ThreadId) -> StorageResult<()> {
        let conn = self.conn.lock();
        let now = now_millis() as i64;
        conn.execute(
            "INSERT OR IGNORE INTO threads (thread_id, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![thread_id.as_str(), now],
        )?;
        Ok(())
    }

    fn append_message(&self, thread_id: &ThreadId, seq: u64, message: &Message) -> StorageResult<()> {
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&message.tool_calls)?)
        };

        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO messages (thread_id, seq, role, content, tool_calls, tool_call_id, is_error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                thread_id.as_str(),
                seq as i64,
                message.role.as_str(),
                message.content,
                tool_calls,
                message.tool_call_id,
                message.is_error as i64,
                message.created_at as i64,
            ],
        )?;
        tx.execute(
            "UPDATE threads SET updated_at = ?2 WHERE thread_id = ?1",
            params![thread_id.as_str(), now_millis() as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn save_files(&self, thread_id: &ThreadId, files: &[Entry]) -> StorageResult<()> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM thread_files WHERE thread_id = ?1",
            params![thread_id.as_str()],
        )?;
        for entry in files {
            tx.execute(
                "INSERT INTO thread_files (thread_id, path, content, version, created_at, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    thread_id.as_str(),
                    entry.path,
                    entry.content,
                    entry.version as i64,
                    entry.created_at as i64,
                    entry.modified_at as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_thread(&self, thread_id: &ThreadId) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM threads WHERE thread_id = ?1",
            params![thread_id.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn list_threads(&self) -> StorageResult<Vec<ThreadId>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT thread_id FROM threads ORDER BY thread_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|r| r.map(ThreadId::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip_with_versions() {
        let store = SqliteStore::in_memory().unwrap();
        let c = CollectionId::default();

        assert_eq!(store.put(&c, "/memories/note.md", "x").unwrap(), 1);
        assert_eq!(store.put(&c, "/memories/note.md", "xy").unwrap(), 2);

        let entry = store.get(&c, "/memories/note.md").unwrap().unwrap();
        assert_eq!(entry.content, "xy");
        assert_eq!(entry.version, 2);
        assert!(store.get(&CollectionId::new("other"), "/memories/note.md").unwrap().is_none());
    }

    #[test]
    fn entries_filter_by_prefix() {
        let store = SqliteStore::in_memory().unwrap();
        let c = CollectionId::default();
        for path in ["/m/b", "/m/a", "/n/c", "/ma"] {
            store.put(&c, path, "").unwrap();
        }
        let paths: Vec<String> = store
            .entries(&c, "/m/")
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec!["/m/a", "/m/b"]);

        assert!(store.remove(&c, "/m/a").unwrap());
        assert!(!store.remove(&c, "/m/a").unwrap());
        assert_eq!(store.entries(&c, "/").unwrap().len(), 3);
    }

    #[test]
    fn thread_history_roundtrip() {
        let store = SqliteStore::in_memory().unwrap();
        let t = ThreadId::new("thread-1");
        assert!(store.load_thread(&t).unwrap().is_none());

        store.create_thread(&t).unwrap();
        store.create_thread(&t).unwrap();
        let call = ToolCall::new("c1", "write_file", serde_json::json!({"path": "/a", "content": "b"}));
        store.append_message(&t, 0, &Message::user("hi")).unwrap();
        store
            .append_message(&t, 1, &Message::assistant_with_calls("", vec![call.clone()]))
            .unwrap();
        store.append_message(&t, 2, &Message::tool_error("c1", "boom")).unwrap();

        // Same seq twice violates the primary key
        assert!(store.append_message(&t, 2, &Message::user("dup")).is_err());

        let record = store.load_thread(&t).unwrap().unwrap();
        assert_eq!(record.messages.len(), 3);
        assert_eq!(record.messages[0].role, Role::User);
        assert_eq!(record.messages[1].tool_calls, vec![call]);
        assert!(record.messages[2].is_error);
        assert_eq!(record.messages[2].tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn corrupt_role_is_an_error() {
        let store = SqliteStore::in_memory().unwrap();
        let t = ThreadId::new("thread-bad");
        store.create_thread(&t).unwrap();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO messages (thread_id, seq, role, content, created_at)
                 VALUES (?1, 0, 'wizard', 'hi', 0)",
                params![t.as_str()],
            )
            .unwrap();

        let err = store.load_thread(&t).unwrap_err();
        assert!(matches!(err, StorageError::Other(ref msg) if msg.contains("wizard")), "{err:?}");
    }

    #[test]
    fn append_to_unknown_thread_fails() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.append_message(&ThreadId::new("ghost"), 0, &Message::user("x"));
        assert!(err.is_err());
    }

    #[test]
    fn file_snapshot_replaces_previous() {
        let store = SqliteStore::in_memory().unwrap();
        let t = ThreadId::new("t");
        store.create_thread(&t).unwrap();

        store
            .save_files(&t, &[Entry::new("/a.md", "1"), Entry::new("/b.md", "2")])
            .unwrap();
        store.save_files(&t, &[Entry::new("/c.md", "3")]).unwrap();

        let record = store.load_thread(&t).unwrap().unwrap();
        let paths: Vec<&str> = record.files.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/c.md"]);
    }

    #[test]
    fn delete_cascades() {
        let store = SqliteStore::in_memory().unwrap();
        let t = ThreadId::new("t");
        store.create_thread(&t).unwrap();
        store.append_message(&t, 0, &Message::user("x")).unwrap();
        store.save_files(&t, &[Entry::new("/a", "1")]).unwrap();

        assert_eq!(store.list_threads().unwrap(), vec![t.clone()]);
        assert!(store.delete_thread(&t).unwrap());
        assert!(!store.delete_thread(&t).unwrap());
        assert!(store.load_thread(&t).unwrap().is_none());

        // Recreated thread starts empty
        store.create_thread(&t).unwrap();
        let record = store.load_thread(&t).unwrap().unwrap();
        assert!(record.messages.is_empty());
        assert!(record.files.is_empty());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agent.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(&CollectionId::default(), "/memories/n.md", "kept").unwrap();
            let t = ThreadId::new("t");
            store.create_thread(&t).unwrap();
            store.append_message(&t, 0, &Message::user("m1")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let entry = store.get(&CollectionId::default(), "/memories/n.md").unwrap().unwrap();
        assert_eq!(entry.content, "kept");
        let record = store.load_thread(&ThreadId::new("t")).unwrap().unwrap();
        assert_eq!(record.messages[0].content, "m1");
    }
}
