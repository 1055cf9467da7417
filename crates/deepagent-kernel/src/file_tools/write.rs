//! WriteEngine — create or overwrite a file.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::tools::{ExecResult, ExecutionEngine};
use crate::vfs::{Backend, FilesystemOps};

use super::{invalid_params, vfs_failure};

/// Engine for writing whole files.
pub struct WriteEngine {
    backend: Arc<Backend>,
}

impl WriteEngine {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct WriteParams {
    path: String,
    content: String,
}

#[async_trait]
impl ExecutionEngine for WriteEngine {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file. Files under /memories/ persist across conversations"
    }

    fn schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute file path to write"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content"
                }
            },
            "required": ["path", "content"]
        }))
    }

    #[tracing::instrument(skip(self, params), name = "engine.write_file")]
    async fn execute(&self, params: &str) -> anyhow::Result<ExecResult> {
        let p: WriteParams = match serde_json::from_str(params) {
            Ok(v) => v,
            Err(e) => return invalid_params(e),
        };

        match self.backend.write(&p.path, &p.content).await {
            Ok(version) => Ok(ExecResult::success(format!(
                "Wrote {} bytes to {} (version {})",
                p.content.len(),
                p.path,
                version
            ))),
            Err(e) => vfs_failure(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ThreadHandle;
    use crate::vfs::StateBackend;
    use deepagent_types::ThreadId;

    #[tokio::test]
    async fn writes_and_reports_version() {
        let backend: Arc<Backend> =
            Arc::new(StateBackend::new(ThreadHandle::detached(ThreadId::new("t"))).into());
        let engine = WriteEngine::new(backend.clone());

        let out = engine
            .execute(r#"{"path": "/plan.md", "content": "step 1"}"#)
            .await
            .unwrap();
        assert_eq!(out.stdout, "Wrote 6 bytes to /plan.md (version 1)");

        let out = engine
            .execute(r#"{"path": "/plan.md", "content": "step 2"}"#)
            .await
            .unwrap();
        assert!(out.stdout.ends_with("(version 2)"));
        assert_eq!(backend.read("/plan.md").await.unwrap(), "step 2");

        let out = engine.execute(r#"{"path": "/", "content": "x"}"#).await.unwrap();
        assert!(!out.success);
    }
}
