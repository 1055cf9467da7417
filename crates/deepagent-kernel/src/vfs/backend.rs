//! The closed set of backend variants.

use async_trait::async_trait;

use super::backends::{StateBackend, StoreBackend};
use super::error::VfsResult;
use super::ops::FilesystemOps;
use super::router::Router;
use super::types::{EditOutcome, Entry, FileInfo, GrepResult};

/// Any backend a session can address.
///
/// Routes hold `Arc<Backend>`, so one durable backend can be mounted at
/// several prefixes and a composite can nest inside another.
#[derive(Debug)]
pub enum Backend {
    /// Per-thread, ephemeral.
    State(StateBackend),
    /// Per-collection, durable.
    Store(StoreBackend),
    /// Prefix-routed dispatch over other backends.
    Composite(Router),
}

impl Backend {
    /// Short name for logs and tool output.
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::State(_) => "state",
            Backend::Store(_) => "store",
            Backend::Composite(_) => "composite",
        }
    }

    fn ops(&self) -> &dyn FilesystemOps {
        match self {
            Backend::State(b) => b,
            Backend::Store(b) => b,
            Backend::Composite(b) => b,
        }
    }
}

impl From<StateBackend> for Backend {
    fn from(b: StateBackend) -> Self {
        Backend::State(b)
    }
}

impl From<StoreBackend> for Backend {
    fn from(b: StoreBackend) -> Self {
        Backend::Store(b)
    }
}

impl From<Router> for Backend {
    fn from(r: Router) -> Self {
        Backend::Composite(r)
    }
}

#[async_trait]
impl FilesystemOps for Backend {
    async fn stat(&self, path: &str) -> VfsResult<Entry> {
        self.ops().stat(path).await
    }

    async fn read(&self, path: &str) -> VfsResult<String> {
        self.ops().read(path).await
    }

    async fn list_info(&self, prefix: &str) -> VfsResult<Vec<FileInfo>> {
        self.ops().list_info(prefix).await
    }

    async fn write(&self, path: &str, content: &str) -> VfsResult<u64> {
        self.ops().write(path, content).await
    }

    async fn edit(&self, path: &str, old: &str, new: &str, replace_all: bool) -> VfsResult<EditOutcome> {
        self.ops().edit(path, old, new, replace_all).await
    }

    async fn delete(&self, path: &str) -> VfsResult<()> {
        self.ops().delete(path).await
    }

    async fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        self.ops().glob(pattern).await
    }

    async fn grep(&self, pattern: &str) -> VfsResult<GrepResult> {
        self.ops().grep(pattern).await
    }
}
