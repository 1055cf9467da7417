//! ReadEngine — read file content with line numbers and windowing.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::tools::{ExecResult, ExecutionEngine};
use crate::vfs::{Backend, FilesystemOps};

use super::format::numbered_lines;
use super::{invalid_params, vfs_failure};

/// Engine for reading a file.
pub struct ReadEngine {
    backend: Arc<Backend>,
}

impl ReadEngine {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct ReadParams {
    path: String,
    offset: Option<usize>,
    limit: Option<usize>,
}

#[async_trait]
impl ExecutionEngine for ReadEngine {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file with line numbers, optionally a window of lines"
    }

    fn schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute file path, e.g. /notes/plan.md"
                },
                "offset": {
                    "type": "integer",
                    "description": "Start line (0-indexed). Omit to read from beginning."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return. Omit for all lines."
                }
            },
            "required": ["path"]
        }))
    }

    #[tracing::instrument(skip(self, params), name = "engine.read_file")]
    async fn execute(&self, params: &str) -> anyhow::Result<ExecResult> {
        let p: ReadParams = match serde_json::from_str(params) {
            Ok(v) => v,
            Err(e) => return invalid_params(e),
        };

        let content = match self.backend.read(&p.path).await {
            Ok(c) => c,
            Err(e) => return vfs_failure(e),
        };

        if content.is_empty() {
            return Ok(ExecResult::success(format!("{} is empty", p.path)));
        }

        let start = p.offset.unwrap_or(0);
        let end = match p.limit {
            Some(limit) => start.saturating_add(limit),
            None => usize::MAX,
        };
        Ok(ExecResult::success(numbered_lines(&content, start, end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ThreadHandle;
    use crate::vfs::StateBackend;
    use deepagent_types::ThreadId;

    async fn engine_with(path: &str, content: &str) -> ReadEngine {
        let backend: Arc<Backend> =
            Arc::new(StateBackend::new(ThreadHandle::detached(ThreadId::new("t"))).into());
        backend.write(path, content).await.unwrap();
        ReadEngine::new(backend)
    }

    #[tokio::test]
    async fn reads_whole_file_and_windows() {
        let engine = engine_with("/a.txt", "one\ntwo\nthree").await;

        let out = engine.execute(r#"{"path": "/a.txt"}"#).await.unwrap();
        assert_eq!(out.stdout, "   1→ one\n   2→ two\n   3→ three");

        let out = engine
            .execute(r#"{"path": "/a.txt", "offset": 1, "limit": 1}"#)
            .await
            .unwrap();
        assert_eq!(out.stdout, "   2→ two");
    }

    #[tokio::test]
    async fn missing_file_is_a_failure() {
        let engine = engine_with("/a.txt", "x").await;
        let out = engine.execute(r#"{"path": "/b.txt"}"#).await.unwrap();
        assert!(!out.success);
        assert_eq!(out.stderr, "not found: /b.txt");

        let out = engine.execute(r#"{"file": "/a.txt"}"#).await.unwrap();
        assert!(out.stderr.starts_with("Invalid params"));
    }
}
