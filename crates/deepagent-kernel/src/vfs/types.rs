//! VFS data types.

use std::collections::BTreeMap;

use deepagent_types::now_millis;
use serde::{Deserialize, Serialize};

/// One stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Normalized absolute path, never empty.
    pub path: String,
    pub content: String,
    /// Bumped on every write or edit. Starts at 1.
    pub version: u64,
    /// Unix millis.
    pub created_at: u64,
    /// Unix millis.
    pub modified_at: u64,
}

impl Entry {
    /// A freshly created entry at version 1.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            path: path.into(),
            content: content.into(),
            version: 1,
            created_at: now,
            modified_at: now,
        }
    }

    /// Replace content and bump the version.
    pub fn overwrite(&mut self, content: impl Into<String>) -> u64 {
        self.content = content.into();
        self.version += 1;
        self.modified_at = now_millis();
        self.version
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            path: self.path.clone(),
            size: self.content.len() as u64,
            version: self.version,
            modified_at: self.modified_at,
        }
    }
}

/// Entry metadata without content, as listed by `ls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    /// Content length in bytes.
    pub size: u64,
    pub version: u64,
    pub modified_at: u64,
}

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepMatch {
    /// 1-based line number.
    pub line: usize,
    pub text: String,
}

/// Path → matching lines, in path order.
pub type GrepResult = BTreeMap<String, Vec<GrepMatch>>;

/// Result of a successful edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOutcome {
    /// Version after the edit.
    pub version: u64,
    pub replacements: usize,
}
