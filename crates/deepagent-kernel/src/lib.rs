//! # deepagent-kernel
//!
//! Runtime core for a tool-using research agent.
//!
//! An agent session binds a model client, a tool registry and a thread
//! checkpointer. The model's file tools land on a virtual filesystem:
//! - Each thread owns an ephemeral namespace, snapshotted with its history
//! - Durable collections outlive threads and process restarts
//! - A router picks between them by longest path prefix (`/memories/` by default)
//! - Threads are resumable by id from the checkpoint store

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod factory;
pub mod file_tools;
pub mod llm;
pub mod session;
pub mod storage;
pub mod tools;
pub mod vfs;
pub mod web_tools;

pub use checkpoint::{Checkpointer, ThreadHandle};
pub use config::{BackendKind, RouteKind, RouteSettings, Settings, StorageKind};
pub use error::{AgentError, AgentResult};
pub use factory::{AgentFactory, BackendBuilder};
pub use llm::{LlmError, LlmResult, ModelClient, ModelReply, OllamaClient, OllamaConfig};
pub use session::AgentSession;
pub use storage::{CheckpointStore, EntryStore, MemoryStore, SqliteStore, StorageError};
pub use tools::{ExecResult, ExecutionEngine, Tool, ToolDescriptor, ToolRegistry};
pub use vfs::{
    Backend, EditOutcome, Entry, FileInfo, FilesystemOps, GrepMatch, GrepResult, Router,
    StateBackend, StoreBackend, VfsError, VfsResult,
};
pub use web_tools::{BrowserContext, BrowserHandle, BrowserLauncher};

pub use deepagent_types::{CollectionId, Message, Role, ThreadId, ToolCall};
