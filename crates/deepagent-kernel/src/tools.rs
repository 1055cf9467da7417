//! Tool registry and execution engines.
//!
//! Every tool the model can call is an [`ExecutionEngine`]: a name, a JSON
//! schema for its input and an async `execute` over a JSON string. The
//! registry holds the external tools; filesystem tools are bound per thread
//! because they close over that thread's backend.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AgentError, AgentResult};
use crate::file_tools;
use crate::vfs::Backend;
use crate::web_tools::{BrowserHandle, BrowserLauncher, browser_tools};

/// Names of the filesystem tools, in the order they are offered.
pub const FILESYSTEM_TOOLS: [&str; 6] = ["ls", "read_file", "write_file", "edit_file", "glob", "grep"];

/// What the model sees of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique within a registry.
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub input_schema: serde_json::Value,
}

/// Result of executing a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    /// Output on success.
    pub stdout: String,
    /// Error description on failure.
    pub stderr: String,
    /// Exit code (0 = success).
    pub exit_code: i32,
    pub success: bool,
}

impl ExecResult {
    /// Create a successful result.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            success: true,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            success: false,
        }
    }

    /// The text the model should see: stdout on success, stderr otherwise.
    pub fn output(&self) -> &str {
        if self.success { &self.stdout } else { &self.stderr }
    }
}

/// A callable tool.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Tool name, as the model calls it.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Run with a JSON arguments string.
    ///
    /// Expected failures (bad arguments, missing file) are `Ok` with
    /// [`ExecResult::failure`]; `Err` is reserved for failures the caller
    /// may need to treat as fatal.
    async fn execute(&self, params: &str) -> anyhow::Result<ExecResult>;

    /// Check if this engine is available/ready.
    async fn is_available(&self) -> bool {
        true
    }

    /// JSON Schema for the input parameters.
    fn schema(&self) -> Option<serde_json::Value> {
        None
    }
}

/// An engine paired with its descriptor.
#[derive(Clone)]
pub struct Tool {
    descriptor: ToolDescriptor,
    engine: Arc<dyn ExecutionEngine>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

impl Tool {
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        let descriptor = ToolDescriptor {
            name: engine.name().to_string(),
            description: engine.description().to_string(),
            input_schema: engine
                .schema()
                .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
        };
        Self { descriptor, engine }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Execute with a JSON arguments value. `null` is treated as `{}`.
    pub async fn call(&self, arguments: &serde_json::Value) -> anyhow::Result<ExecResult> {
        let params = if arguments.is_null() {
            "{}".to_string()
        } else {
            arguments.to_string()
        };
        self.engine.execute(&params).await
    }
}

/// External tools plus the resources they hold.
///
/// Names are unique across the registry and the six filesystem tools;
/// registering a clash is [`AgentError::DuplicateTool`]. The registry owns at
/// most one browser context and releases it in [`ToolRegistry::shutdown`].
#[derive(Default)]
pub struct ToolRegistry {
    external: IndexMap<String, Arc<dyn ExecutionEngine>>,
    browser: Option<BrowserHandle>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("external", &self.external.keys().collect::<Vec<_>>())
            .field("browser", &self.browser.is_some())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an external tool.
    pub fn register(&mut self, engine: Arc<dyn ExecutionEngine>) -> AgentResult<()> {
        let name = engine.name().to_string();
        if FILESYSTEM_TOOLS.contains(&name.as_str()) || self.external.contains_key(&name) {
            return Err(AgentError::DuplicateTool { name });
        }
        self.external.insert(name, engine);
        Ok(())
    }

    /// Launch a browser and register the browser tools.
    ///
    /// Launch failure is logged and the browser tools are left out; agent
    /// construction carries on. Returns whether the tools were added. A
    /// registry holds at most one context, so a second call is a no-op.
    pub async fn attach_browser(&mut self, launcher: &dyn BrowserLauncher) -> AgentResult<bool> {
        if self.browser.is_some() {
            return Ok(true);
        }
        let handle = match BrowserHandle::acquire(launcher).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "browser unavailable, browser tools omitted");
                return Ok(false);
            }
        };
        for engine in browser_tools(&handle) {
            if let Err(e) = self.register(engine) {
                handle.release().await;
                return Err(e);
            }
        }
        info!("browser tools registered");
        self.browser = Some(handle);
        Ok(true)
    }

    /// External tool names in registration order.
    pub fn external_names(&self) -> Vec<&str> {
        self.external.keys().map(String::as_str).collect()
    }

    /// Every tool name offered to the model, filesystem tools first.
    pub fn names(&self) -> Vec<&str> {
        FILESYSTEM_TOOLS
            .iter()
            .copied()
            .chain(self.external.keys().map(String::as_str))
            .collect()
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    /// Tools for one backend: the filesystem tools bound to it, then every
    /// external tool.
    pub fn available_tools(&self, backend: &Arc<Backend>) -> Vec<Tool> {
        file_tools::filesystem_engines(backend)
            .into_iter()
            .chain(self.external.values().cloned())
            .map(Tool::new)
            .collect()
    }

    /// Release held resources (the browser context). Safe to call twice.
    pub async fn shutdown(&self) {
        if let Some(handle) = &self.browser {
            handle.release().await;
        }
    }
}

/// A no-op execution engine for testing.
#[derive(Debug)]
pub struct NoopEngine {
    name: String,
}

impl NoopEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ExecutionEngine for NoopEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "No-op engine for testing"
    }

    async fn execute(&self, params: &str) -> anyhow::Result<ExecResult> {
        Ok(ExecResult::success(format!("noop: {}", params)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ThreadHandle;
    use crate::vfs::StateBackend;
    use deepagent_types::ThreadId;

    fn backend() -> Arc<Backend> {
        Arc::new(StateBackend::new(ThreadHandle::detached(ThreadId::new("t"))).into())
    }

    #[test]
    fn exec_result() {
        let success = ExecResult::success("output");
        assert!(success.success);
        assert_eq!(success.exit_code, 0);
        assert_eq!(success.output(), "output");

        let failure = ExecResult::failure(1, "error");
        assert!(!failure.success);
        assert_eq!(failure.output(), "error");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NoopEngine::new("web_scraper"))).unwrap();

        let err = registry
            .register(Arc::new(NoopEngine::new("web_scraper")))
            .unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool { ref name } if name == "web_scraper"));

        let err = registry.register(Arc::new(NoopEngine::new("grep"))).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool { ref name } if name == "grep"));
        assert_eq!(registry.external_names(), vec!["web_scraper"]);
    }

    #[test]
    fn available_tools_are_ordered_and_unique() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NoopEngine::new("zeta"))).unwrap();
        registry.register(Arc::new(NoopEngine::new("alpha"))).unwrap();

        let tools = registry.available_tools(&backend());
        let names: Vec<&str> = tools.iter().map(Tool::name).collect();
        assert_eq!(
            names,
            vec!["ls", "read_file", "write_file", "edit_file", "glob", "grep", "zeta", "alpha"]
        );
        for tool in &tools {
            assert_eq!(tool.descriptor().input_schema["type"], "object");
        }
    }

    #[tokio::test]
    async fn null_arguments_become_empty_object() {
        let tool = Tool::new(Arc::new(NoopEngine::new("noop")));
        let result = tool.call(&serde_json::Value::Null).await.unwrap();
        assert_eq!(result.stdout, "noop: {}");
    }
}
