//! EditEngine — exact string replacement.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::tools::{ExecResult, ExecutionEngine};
use crate::vfs::{Backend, FilesystemOps, VfsError};

use super::format::context_around;
use super::{invalid_params, vfs_failure};

/// Engine for editing files via exact string replacement.
pub struct EditEngine {
    backend: Arc<Backend>,
}

impl EditEngine {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct EditParams {
    path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

#[async_trait]
impl ExecutionEngine for EditEngine {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file by exact string replacement"
    }

    fn schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path to edit"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact string to find; must occur exactly once unless replace_all is set"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)",
                    "default": false
                }
            },
            "required": ["path", "old_string", "new_string"]
        }))
    }

    #[tracing::instrument(skip(self, params), name = "engine.edit_file")]
    async fn execute(&self, params: &str) -> anyhow::Result<ExecResult> {
        let p: EditParams = match serde_json::from_str(params) {
            Ok(v) => v,
            Err(e) => return invalid_params(e),
        };

        if p.old_string == p.new_string {
            return Ok(ExecResult::failure(1, "old_string and new_string are identical"));
        }

        let outcome = match self
            .backend
            .edit(&p.path, &p.old_string, &p.new_string, p.replace_all)
            .await
        {
            Ok(outcome) => outcome,
            Err(VfsError::NoMatch { path, occurrences: 0 }) => {
                return Ok(ExecResult::failure(
                    1,
                    format!("old_string not found in {}. Make sure it matches exactly.", path),
                ));
            }
            Err(VfsError::NoMatch { path, occurrences }) => {
                return Ok(ExecResult::failure(
                    1,
                    format!(
                        "old_string found {} times in {}. Use replace_all: true or provide more context to make it unique.",
                        occurrences, path
                    ),
                ));
            }
            Err(e) => return vfs_failure(e),
        };

        // Context is a courtesy; a concurrent delete just leaves it out.
        let context = match self.backend.read(&p.path).await {
            Ok(updated) => updated
                .find(&p.new_string)
                .map(|pos| context_around(&updated, pos, p.new_string.len()))
                .unwrap_or_default(),
            Err(_) => String::new(),
        };

        Ok(ExecResult::success(format!(
            "Replaced {} occurrence{} in {} (version {})\n\n{}",
            outcome.replacements,
            if outcome.replacements == 1 { "" } else { "s" },
            p.path,
            outcome.version,
            context
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ThreadHandle;
    use crate::vfs::StateBackend;
    use deepagent_types::ThreadId;

    async fn setup(content: &str) -> (Arc<Backend>, EditEngine) {
        let backend: Arc<Backend> =
            Arc::new(StateBackend::new(ThreadHandle::detached(ThreadId::new("t"))).into());
        backend.write("/f.txt", content).await.unwrap();
        (backend.clone(), EditEngine::new(backend))
    }

    #[tokio::test]
    async fn single_replacement() {
        let (backend, engine) = setup("alpha\nbeta\ngamma").await;
        let out = engine
            .execute(r#"{"path": "/f.txt", "old_string": "beta", "new_string": "BETA"}"#)
            .await
            .unwrap();
        assert!(out.success, "{}", out.stderr);
        assert!(out.stdout.starts_with("Replaced 1 occurrence in /f.txt (version 2)"));
        assert!(out.stdout.contains("   2→ BETA"));
        assert_eq!(backend.read("/f.txt").await.unwrap(), "alpha\nBETA\ngamma");
    }

    #[tokio::test]
    async fn ambiguous_match_leaves_file_alone() {
        let (backend, engine) = setup("x x").await;
        let out = engine
            .execute(r#"{"path": "/f.txt", "old_string": "x", "new_string": "y"}"#)
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.stderr.contains("found 2 times"));
        assert_eq!(backend.read("/f.txt").await.unwrap(), "x x");

        let out = engine
            .execute(r#"{"path": "/f.txt", "old_string": "x", "new_string": "y", "replace_all": true}"#)
            .await
            .unwrap();
        assert!(out.stdout.starts_with("Replaced 2 occurrences"));
        assert_eq!(backend.read("/f.txt").await.unwrap(), "y y");
    }

    #[tokio::test]
    async fn rejects_noop_and_missing() {
        let (_, engine) = setup("abc").await;
        let out = engine
            .execute(r#"{"path": "/f.txt", "old_string": "a", "new_string": "a"}"#)
            .await
            .unwrap();
        assert_eq!(out.stderr, "old_string and new_string are identical");

        let out = engine
            .execute(r#"{"path": "/f.txt", "old_string": "zzz", "new_string": "a"}"#)
            .await
            .unwrap();
        assert!(out.stderr.starts_with("old_string not found in /f.txt"));

        let out = engine
            .execute(r#"{"path": "/nope.txt", "old_string": "a", "new_string": "b"}"#)
            .await
            .unwrap();
        assert_eq!(out.stderr, "not found: /nope.txt");
    }
}
