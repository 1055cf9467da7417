//! LsEngine — list entries under a directory prefix.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::tools::{ExecResult, ExecutionEngine};
use crate::vfs::{Backend, FilesystemOps};

use super::{invalid_params, vfs_failure};

/// Engine for listing files with size and version.
pub struct LsEngine {
    backend: Arc<Backend>,
}

impl LsEngine {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct LsParams {
    #[serde(default = "root")]
    path: String,
}

fn root() -> String {
    "/".to_string()
}

#[async_trait]
impl ExecutionEngine for LsEngine {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List files under a directory, with size in bytes and version"
    }

    fn schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: '/')"
                }
            }
        }))
    }

    #[tracing::instrument(skip(self, params), name = "engine.ls")]
    async fn execute(&self, params: &str) -> anyhow::Result<ExecResult> {
        let p: LsParams = match serde_json::from_str(params) {
            Ok(v) => v,
            Err(e) => return invalid_params(e),
        };

        let infos = match self.backend.list_info(&p.path).await {
            Ok(infos) => infos,
            Err(e) => return vfs_failure(e),
        };

        if infos.is_empty() {
            return Ok(ExecResult::success(format!("No files under {}", p.path)));
        }

        let lines: Vec<String> = infos
            .iter()
            .map(|info| format!("{}\t{} bytes\tv{}", info.path, info.size, info.version))
            .collect();
        Ok(ExecResult::success(lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ThreadHandle;
    use crate::vfs::StateBackend;
    use deepagent_types::ThreadId;

    #[tokio::test]
    async fn lists_with_metadata() {
        let backend: Arc<Backend> =
            Arc::new(StateBackend::new(ThreadHandle::detached(ThreadId::new("t"))).into());
        backend.write("/notes/a.md", "hello").await.unwrap();
        backend.write("/notes/a.md", "hello!").await.unwrap();
        backend.write("/todo.md", "x").await.unwrap();

        let engine = LsEngine::new(backend);
        let out = engine.execute("{}").await.unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, "/notes/a.md\t6 bytes\tv2\n/todo.md\t1 bytes\tv1");

        let out = engine.execute(r#"{"path": "/empty"}"#).await.unwrap();
        assert_eq!(out.stdout, "No files under /empty");

        let out = engine.execute(r#"{"path": "../etc"}"#).await.unwrap();
        assert!(!out.success);
        assert!(out.stderr.contains("invalid path"));
    }
}
