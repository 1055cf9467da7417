//! Filesystem tools the model calls.
//!
//! Six engines, one per module, each bound to the backend of the thread it
//! serves:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Model tool calls                │
//! └──────────────────────┬───────────────────────┘
//!                        │ JSON params
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │ ls  read_file  write_file  edit_file  glob  grep │
//! └──────────────────────┬───────────────────────┘
//!                        │ FilesystemOps
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │  Backend (State | Store | Composite router)  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Recoverable VFS errors come back as `ExecResult::failure` so the model can
//! try again. A failing storage layer is an `Err` carrying the [`VfsError`],
//! which the session downcasts to abort the invocation.

pub mod edit;
mod format;
pub mod glob;
pub mod grep;
pub mod ls;
pub mod read;
pub mod write;

pub use edit::EditEngine;
pub use glob::GlobEngine;
pub use grep::GrepEngine;
pub use ls::LsEngine;
pub use read::ReadEngine;
pub use write::WriteEngine;

use std::sync::Arc;

use crate::tools::{ExecResult, ExecutionEngine};
use crate::vfs::{Backend, VfsError};

/// The six filesystem engines over `backend`, in the order offered to the
/// model.
pub fn filesystem_engines(backend: &Arc<Backend>) -> Vec<Arc<dyn ExecutionEngine>> {
    vec![
        Arc::new(LsEngine::new(backend.clone())),
        Arc::new(ReadEngine::new(backend.clone())),
        Arc::new(WriteEngine::new(backend.clone())),
        Arc::new(EditEngine::new(backend.clone())),
        Arc::new(GlobEngine::new(backend.clone())),
        Arc::new(GrepEngine::new(backend.clone())),
    ]
}

/// Turn a VFS error into an engine result.
fn vfs_failure(e: VfsError) -> anyhow::Result<ExecResult> {
    if e.is_recoverable() {
        Ok(ExecResult::failure(1, e.to_string()))
    } else {
        Err(e.into())
    }
}

fn invalid_params(e: serde_json::Error) -> anyhow::Result<ExecResult> {
    Ok(ExecResult::failure(1, format!("Invalid params: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_are_errors() {
        let result = vfs_failure(VfsError::not_found("/x")).unwrap();
        assert!(!result.success);
        assert_eq!(result.stderr, "not found: /x");

        let err = vfs_failure(VfsError::storage("disk full")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VfsError>(),
            Some(VfsError::StorageUnavailable(_))
        ));
    }
}
