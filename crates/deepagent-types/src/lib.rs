//! Shared identity and message types for deepagent.
//!
//! This is a leaf crate with no internal dependencies. The kernel builds its
//! checkpointer, backends and model loop on top of these.
//!
//! | Type             | Purpose                                           |
//! |------------------|---------------------------------------------------|
//! | [`ThreadId`]     | One resumable conversation                        |
//! | [`CollectionId`] | Namespace of a durable entry store                |
//! | [`Role`]         | Who produced a message                            |
//! | [`Message`]      | One record in a thread's history                  |
//! | [`ToolCall`]     | A model's request to run a named tool             |

pub mod ids;
pub mod message;

pub use ids::{CollectionId, IdError, ThreadId};
pub use message::{Message, Role, ToolCall};

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
