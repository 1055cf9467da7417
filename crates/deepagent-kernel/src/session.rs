//! The agent loop.
//!
//! One [`AgentSession::invoke`] call runs the model/tool loop for a thread to
//! completion:
//!
//! ```text
//! create_or_resume ─► append(user) ─► ┌─► model.complete(system + history)
//!                                     │        │
//!                                     │   append(assistant)
//!                                     │        │ tool calls?
//!                                     │        ├── no ──► snapshot ─► return
//!                                     │        ▼ yes
//!                                     │   run each tool, append(tool result)
//!                                     └── snapshot
//! ```
//!
//! Every message is written through to the checkpoint store as it is
//! appended, so whatever happened before a failure is kept and the thread can
//! be retried. A storage failure inside a tool aborts the invocation; the
//! round's unanswered calls are first closed with tool errors so the history
//! stays well-formed. Invocations on different threads may run concurrently; callers
//! serialize invocations on the same thread.

use std::sync::Arc;
use std::time::Instant;

use deepagent_types::{Message, ThreadId, ToolCall};
use tracing::{debug, info, warn};

use crate::checkpoint::Checkpointer;
use crate::error::{AgentError, AgentResult};
use crate::factory::BackendBuilder;
use crate::llm::ModelClient;
use crate::tools::{Tool, ToolDescriptor, ToolRegistry};
use crate::vfs::{Backend, VfsError};

/// A model, its tools and a checkpointer, invocable per thread.
pub struct AgentSession {
    model: Arc<dyn ModelClient>,
    tools: ToolRegistry,
    checkpointer: Arc<Checkpointer>,
    backends: BackendBuilder,
    system_prompt: String,
    max_iterations: usize,
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("model", &self.model.model_name())
            .field("tools", &self.tools)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

impl AgentSession {
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: ToolRegistry,
        checkpointer: Arc<Checkpointer>,
        backends: BackendBuilder,
    ) -> Self {
        Self {
            model,
            tools,
            checkpointer,
            backends,
            system_prompt: crate::config::DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 25,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// A fresh random thread id.
    pub fn new_thread(&self) -> ThreadId {
        ThreadId::generate()
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn checkpointer(&self) -> &Arc<Checkpointer> {
        &self.checkpointer
    }

    /// Names of every tool the model is offered, in order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.names()
    }

    /// Full history of a thread. Reading never creates the thread.
    pub fn history(&self, thread_id: &ThreadId) -> AgentResult<Vec<Message>> {
        self.checkpointer.load_history(thread_id)
    }

    /// The filesystem a thread's tools operate on.
    pub fn filesystem(&self, thread_id: &ThreadId) -> AgentResult<Arc<Backend>> {
        let thread = self.checkpointer.create_or_resume(thread_id)?;
        self.backends.build(&thread)
    }

    /// Send `user_message` on `thread_id` and run until the model answers
    /// without tool calls.
    #[tracing::instrument(skip(self, thread_id, user_message), fields(thread_id = %thread_id), name = "agent.invoke")]
    pub async fn invoke(
        &self,
        thread_id: &ThreadId,
        user_message: impl Into<String>,
    ) -> AgentResult<Message> {
        let started = Instant::now();
        let thread = self.checkpointer.create_or_resume(thread_id)?;
        self.checkpointer.append(thread_id, Message::user(user_message))?;
        debug!(messages = thread.message_count(), "agent invocation started");

        let backend = self.backends.build(&thread)?;
        let tools = self.tools.available_tools(&backend);
        let descriptors: Vec<ToolDescriptor> =
            tools.iter().map(|t| t.descriptor().clone()).collect();

        for iteration in 1..=self.max_iterations {
            let mut request = Vec::with_capacity(thread.message_count() + 1);
            request.push(Message::system(self.system_prompt.as_str()));
            request.extend(thread.messages());

            let reply = self.model.complete(&request, &descriptors).await?;
            let message = reply.into_message();
            self.checkpointer.append(thread_id, message.clone())?;

            if !message.has_tool_calls() {
                self.checkpointer.snapshot(thread_id)?;
                info!(
                    iterations = iteration,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "agent invocation completed"
                );
                return Ok(message);
            }

            debug!(iteration, calls = message.tool_calls.len(), "running tool calls");
            for (i, call) in message.tool_calls.iter().enumerate() {
                match run_tool(&tools, call).await {
                    Ok(result) => {
                        self.checkpointer.append(thread_id, result)?;
                    }
                    Err(e) => {
                        self.close_unanswered(thread_id, &message.tool_calls[i..], &e);
                        return Err(e);
                    }
                }
            }
            self.checkpointer.snapshot(thread_id)?;
        }

        warn!(limit = self.max_iterations, "agent loop hit max iterations, stopping");
        Err(AgentError::IterationLimit {
            thread_id: thread_id.clone(),
            limit: self.max_iterations,
        })
    }

    /// Answer every call in `calls` with an error so the history stays
    /// well-formed for a retry. Best effort: the store may be the thing that
    /// failed.
    fn close_unanswered(&self, thread_id: &ThreadId, calls: &[ToolCall], cause: &AgentError) {
        for call in calls {
            let err = AgentError::tool(&call.name, format!("not completed: {}", cause));
            if let Err(e) = self
                .checkpointer
                .append(thread_id, Message::tool_error(&call.id, err.to_string()))
            {
                warn!(tool = %call.name, error = %e, "could not record interrupted tool call");
                return;
            }
        }
        if let Err(e) = self.checkpointer.snapshot(thread_id) {
            warn!(error = %e, "could not snapshot after interrupted tool round");
        }
    }

    /// Release external resources held by the tools.
    pub async fn shutdown(&self) {
        self.tools.shutdown().await;
    }
}

/// Run one tool call and describe the outcome for the model.
///
/// Only a failing storage layer escapes as an error; everything else,
/// including unknown tools and malformed arguments, becomes a tool-error
/// message the model can react to.
async fn run_tool(tools: &[Tool], call: &ToolCall) -> AgentResult<Message> {
    let Some(tool) = tools.iter().find(|t| t.name() == call.name) else {
        warn!(tool = %call.name, "model called an unknown tool");
        let err = AgentError::tool(&call.name, "no such tool");
        return Ok(Message::tool_error(&call.id, err.to_string()));
    };

    debug!(tool = %call.name, "executing tool");
    match tool.call(&call.arguments).await {
        Ok(result) if result.success => Ok(Message::tool_result(&call.id, result.stdout)),
        Ok(result) => {
            debug!(tool = %call.name, error = %result.stderr, "tool failed");
            let err = AgentError::tool(&call.name, result.stderr);
            Ok(Message::tool_error(&call.id, err.to_string()))
        }
        Err(e) => match e.downcast_ref::<VfsError>() {
            Some(VfsError::StorageUnavailable(msg)) => {
                Err(AgentError::StorageUnavailable(msg.clone()))
            }
            _ => {
                warn!(tool = %call.name, error = %e, "tool execution error");
                let err = AgentError::tool(&call.name, e.to_string());
                Ok(Message::tool_error(&call.id, err.to_string()))
            }
        },
    }
}
