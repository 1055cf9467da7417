//! GlobEngine — find files by shell-style pattern.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::tools::{ExecResult, ExecutionEngine};
use crate::vfs::{Backend, FilesystemOps, is_under, normalize_path};

use super::{invalid_params, vfs_failure};

/// Maximum number of paths to return.
const MAX_RESULTS: usize = 1000;

/// Engine for glob-based file discovery.
pub struct GlobEngine {
    backend: Arc<Backend>,
}

impl GlobEngine {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct GlobParams {
    pattern: String,
    path: Option<String>,
}

#[async_trait]
impl ExecutionEngine for GlobEngine {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern. '*' stays within one directory, '**' recurses"
    }

    fn schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern (e.g., '*.md', '**/*.md', '/memories/*')"
                },
                "path": {
                    "type": "string",
                    "description": "Only return matches under this directory (default: '/')"
                }
            },
            "required": ["pattern"]
        }))
    }

    #[tracing::instrument(skip(self, params), name = "engine.glob")]
    async fn execute(&self, params: &str) -> anyhow::Result<ExecResult> {
        let p: GlobParams = match serde_json::from_str(params) {
            Ok(v) => v,
            Err(e) => return invalid_params(e),
        };

        let dir = match p.path.as_deref().map(normalize_path).transpose() {
            Ok(dir) => dir,
            Err(e) => return vfs_failure(e),
        };

        let mut paths = match self.backend.glob(&p.pattern).await {
            Ok(paths) => paths,
            Err(e) => return vfs_failure(e),
        };
        if let Some(dir) = &dir {
            paths.retain(|path| is_under(path, dir));
        }

        if paths.is_empty() {
            return Ok(ExecResult::success("No files matched."));
        }

        let total = paths.len();
        paths.truncate(MAX_RESULTS);
        let mut output = paths.join("\n");
        if total > MAX_RESULTS {
            output.push_str(&format!("\n... ({} more)", total - MAX_RESULTS));
        }
        Ok(ExecResult::success(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ThreadHandle;
    use crate::vfs::StateBackend;
    use deepagent_types::ThreadId;

    async fn engine() -> GlobEngine {
        let backend: Arc<Backend> =
            Arc::new(StateBackend::new(ThreadHandle::detached(ThreadId::new("t"))).into());
        for path in ["/a.md", "/b.txt", "/sub/c.md"] {
            backend.write(path, "x").await.unwrap();
        }
        GlobEngine::new(backend)
    }

    #[tokio::test]
    async fn star_is_single_segment() {
        let engine = engine().await;
        let out = engine.execute(r#"{"pattern": "*.md"}"#).await.unwrap();
        assert_eq!(out.stdout, "/a.md");

        let out = engine.execute(r#"{"pattern": "**/*.md"}"#).await.unwrap();
        assert_eq!(out.stdout, "/a.md\n/sub/c.md");
    }

    #[tokio::test]
    async fn path_narrows_results() {
        let engine = engine().await;
        let out = engine
            .execute(r#"{"pattern": "**/*.md", "path": "/sub"}"#)
            .await
            .unwrap();
        assert_eq!(out.stdout, "/sub/c.md");

        let out = engine.execute(r#"{"pattern": "*.rs"}"#).await.unwrap();
        assert_eq!(out.stdout, "No files matched.");

        let out = engine.execute(r#"{"pattern": "[z"}"#).await.unwrap();
        assert!(!out.success);
        assert!(out.stderr.contains("invalid pattern"));
    }
}
