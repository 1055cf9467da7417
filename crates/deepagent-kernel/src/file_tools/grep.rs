//! GrepEngine — regex search across file content.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::tools::{ExecResult, ExecutionEngine};
use crate::vfs::{Backend, FilesystemOps, GlobPattern, is_under, normalize_path};

use super::{invalid_params, vfs_failure};

/// Maximum number of matches to return.
const MAX_MATCHES: usize = 200;

/// Engine for searching file content.
pub struct GrepEngine {
    backend: Arc<Backend>,
}

impl GrepEngine {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct GrepParams {
    pattern: String,
    path: Option<String>,
    glob: Option<String>,
}

#[async_trait]
impl ExecutionEngine for GrepEngine {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file content with a regex (falls back to literal text)"
    }

    fn schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (default: '/')"
                },
                "glob": {
                    "type": "string",
                    "description": "File glob filter (e.g., '*.md', '**/*.md')"
                }
            },
            "required": ["pattern"]
        }))
    }

    #[tracing::instrument(skip(self, params), name = "engine.grep")]
    async fn execute(&self, params: &str) -> anyhow::Result<ExecResult> {
        let p: GrepParams = match serde_json::from_str(params) {
            Ok(v) => v,
            Err(e) => return invalid_params(e),
        };

        let dir = match p.path.as_deref().map(normalize_path).transpose() {
            Ok(dir) => dir,
            Err(e) => return vfs_failure(e),
        };
        let filter = match p.glob.as_deref().map(GlobPattern::new).transpose() {
            Ok(filter) => filter,
            Err(e) => return vfs_failure(e),
        };

        let hits = match self.backend.grep(&p.pattern).await {
            Ok(hits) => hits,
            Err(e) => return vfs_failure(e),
        };

        let mut output = String::new();
        let mut total_matches = 0;
        let mut truncated = false;

        let files = hits.iter().filter(|(path, _)| {
            dir.as_deref().is_none_or(|d| is_under(path, d))
                && filter.as_ref().is_none_or(|g| g.is_match(path))
        });
        'files: for (path, matches) in files {
            for m in matches {
                if total_matches >= MAX_MATCHES {
                    truncated = true;
                    break 'files;
                }
                total_matches += 1;
                output.push_str(&format!("{}:{}:{}\n", path, m.line, m.text));
            }
        }

        if total_matches == 0 {
            Ok(ExecResult::success("No matches found."))
        } else {
            let truncated = if truncated {
                format!(" (truncated at {} matches)", MAX_MATCHES)
            } else {
                String::new()
            };
            Ok(ExecResult::success(format!(
                "{}{} match{}{}",
                output,
                total_matches,
                if total_matches == 1 { "" } else { "es" },
                truncated
            )))
        }
    }
}
