//! Model client abstraction.
//!
//! The session only needs one call: send the history and the tool
//! descriptors, get back text and tool calls. [`OllamaClient`] is the one
//! provider; tests script their own [`ModelClient`].

mod ollama;

pub use ollama::{OllamaClient, OllamaConfig};

use async_trait::async_trait;
use deepagent_types::{Message, ToolCall};
use serde::{Deserialize, Serialize};

use crate::tools::ToolDescriptor;

/// What the model said back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    pub content: String,
    /// Empty when the model is done.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    /// A final answer with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }

    /// The reply as an assistant history record.
    pub fn into_message(self) -> Message {
        if self.tool_calls.is_empty() {
            Message::assistant(self.content)
        } else {
            Message::assistant_with_calls(self.content, self.tool_calls)
        }
    }
}

/// Error type for model calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Server not reachable, or it timed out.
    #[error("provider not available: {0}")]
    Unavailable(String),

    /// Server answered with something we can't use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Server answered with an error status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport failed mid-request.
    #[error("network error: {0}")]
    Network(String),
}

/// Result type for model calls.
pub type LlmResult<T> = Result<T, LlmError>;

/// A chat model that can request tool calls.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// One completion over the full history.
    async fn complete(&self, messages: &[Message], tools: &[ToolDescriptor]) -> LlmResult<ModelReply>;

    /// Check if the server is reachable.
    async fn is_available(&self) -> bool {
        true
    }
}
