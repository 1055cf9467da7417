//! Caller-facing error taxonomy.
//!
//! | Variant              | Raised by                     | Recoverable by the model? |
//! |----------------------|-------------------------------|---------------------------|
//! | `Vfs`                | backends, router              | yes (fed back as a tool result) |
//! | `ToolExecution`      | tool engines                  | yes                       |
//! | `DuplicateTool`      | tool registry construction    | no                        |
//! | `UnknownThread`      | checkpointer                  | no                        |
//! | `StorageUnavailable` | storage layer                 | no, aborts the invocation |
//! | `ModelUnavailable`   | model client                  | no, aborts the invocation |
//! | `Configuration`      | settings, factory             | no                        |
//! | `IterationLimit`     | session loop                  | no                        |

use deepagent_types::ThreadId;
use thiserror::Error;

use crate::llm::LlmError;
use crate::storage::StorageError;
use crate::vfs::VfsError;

#[derive(Debug, Error)]
pub enum AgentError {
    /// `NotFound`, `NoMatch`, `InvalidPath`, `InvalidPattern`.
    #[error(transparent)]
    Vfs(VfsError),

    #[error("duplicate tool name: {name}")]
    DuplicateTool { name: String },

    #[error("unknown thread {thread_id}: create_or_resume was not called in this process")]
    UnknownThread { thread_id: ThreadId },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("tool {tool} failed: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("thread {thread_id}: model still calling tools after {limit} iterations")]
    IterationLimit { thread_id: ThreadId, limit: usize },
}

pub type AgentResult<T> = Result<T, AgentError>;

impl AgentError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn unknown_thread(thread_id: &ThreadId) -> Self {
        Self::UnknownThread {
            thread_id: thread_id.clone(),
        }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether the model loop should see this error as a tool result and
    /// carry on, rather than abort the invocation.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Vfs(e) => e.is_recoverable(),
            Self::ToolExecution { .. } => true,
            _ => false,
        }
    }
}

impl From<VfsError> for AgentError {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::StorageUnavailable(msg) => Self::StorageUnavailable(msg),
            other => Self::Vfs(other),
        }
    }
}

impl From<StorageError> for AgentError {
    fn from(e: StorageError) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        Self::ModelUnavailable(e.to_string())
    }
}
