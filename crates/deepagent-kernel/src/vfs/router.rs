//! Prefix router over backends.
//!
//! Resolves each path to one backend by longest matching prefix and passes
//! the path through unchanged. Operations that span many paths (`list`,
//! `glob`, `grep`) fan out to every distinct backend and keep only the paths
//! each backend actually owns under the same routing rule.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::backend::Backend;
use super::error::{VfsError, VfsResult};
use super::ops::FilesystemOps;
use super::path::normalize_path;
use super::types::{EditOutcome, Entry, FileInfo, GrepResult};

/// One `(prefix, backend)` pair.
#[derive(Debug, Clone)]
pub struct Route {
    prefix: String,
    backend: Arc<Backend>,
}

impl Route {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

/// Routes filesystem operations to backends by path prefix.
///
/// Prefixes are compared as plain strings against the normalized path, so
/// `/memories/` matches `/memories/note.md` but not `/memories` itself. When
/// several prefixes match, the longest wins; equal prefixes resolve to the
/// one registered first. Paths no route claims go to the default backend.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
    default: Arc<Backend>,
}

impl Router {
    pub fn new(default: Arc<Backend>) -> Self {
        Self {
            routes: Vec::new(),
            default,
        }
    }

    /// Builder form of [`Router::add_route`].
    pub fn with_route(mut self, prefix: &str, backend: Arc<Backend>) -> VfsResult<Self> {
        self.add_route(prefix, backend)?;
        Ok(self)
    }

    /// Register a route. The prefix must be absolute and free of `..`.
    pub fn add_route(&mut self, prefix: &str, backend: Arc<Backend>) -> VfsResult<()> {
        let prefix = normalize_route_prefix(prefix)?;
        tracing::debug!(prefix = %prefix, backend = backend.kind(), "route added");
        self.routes.push(Route { prefix, backend });
        Ok(())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn default_backend(&self) -> &Arc<Backend> {
        &self.default
    }

    /// Normalize `path` and pick its backend.
    pub fn resolve(&self, path: &str) -> VfsResult<(String, &Arc<Backend>)> {
        let normalized = normalize_path(path)?;
        let backend = self.backend_for(&normalized);
        Ok((normalized, backend))
    }

    /// The matching route's prefix, or `None` for the default backend.
    pub fn matched_prefix(&self, normalized: &str) -> Option<&str> {
        self.best_route(normalized).map(|r| r.prefix.as_str())
    }

    fn best_route(&self, normalized: &str) -> Option<&Route> {
        let mut best: Option<&Route> = None;
        for route in &self.routes {
            if !normalized.starts_with(&route.prefix) {
                continue;
            }
            // Strictly longer only, so the first of equal prefixes stays.
            if best.is_none_or(|b| route.prefix.len() > b.prefix.len()) {
                best = Some(route);
            }
        }
        best
    }

    fn backend_for(&self, normalized: &str) -> &Arc<Backend> {
        self.best_route(normalized)
            .map(|r| &r.backend)
            .unwrap_or(&self.default)
    }

    fn owns(&self, backend: &Arc<Backend>, path: &str) -> bool {
        Arc::ptr_eq(self.backend_for(path), backend)
    }

    /// Default first, then each route's backend once.
    fn distinct_backends(&self) -> Vec<&Arc<Backend>> {
        let mut out: Vec<&Arc<Backend>> = vec![&self.default];
        for route in &self.routes {
            if !out.iter().any(|b| Arc::ptr_eq(b, &route.backend)) {
                out.push(&route.backend);
            }
        }
        out
    }
}

/// Canonical route prefix: normalized, keeping a trailing `/` if given.
pub fn normalize_route_prefix(raw: &str) -> VfsResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VfsError::invalid_path(raw, "route prefix is empty"));
    }
    if !trimmed.starts_with('/') {
        return Err(VfsError::invalid_path(raw, "route prefix must be absolute"));
    }
    let mut prefix = normalize_path(trimmed)?;
    if trimmed.ends_with('/') && prefix != "/" {
        prefix.push('/');
    }
    Ok(prefix)
}

#[async_trait]
impl FilesystemOps for Router {
    async fn stat(&self, path: &str) -> VfsResult<Entry> {
        let (path, backend) = self.resolve(path)?;
        backend.stat(&path).await
    }

    async fn read(&self, path: &str) -> VfsResult<String> {
        let (path, backend) = self.resolve(path)?;
        backend.read(&path).await
    }

    async fn list_info(&self, prefix: &str) -> VfsResult<Vec<FileInfo>> {
        let dir = normalize_path(prefix)?;
        let mut merged = BTreeMap::new();
        for backend in self.distinct_backends() {
            for info in backend.list_info(&dir).await? {
                if self.owns(backend, &info.path) {
                    merged.insert(info.path.clone(), info);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    async fn write(&self, path: &str, content: &str) -> VfsResult<u64> {
        let (path, backend) = self.resolve(path)?;
        tracing::trace!(path = %path, backend = backend.kind(), "write routed");
        backend.write(&path, content).await
    }

    async fn edit(&self, path: &str, old: &str, new: &str, replace_all: bool) -> VfsResult<EditOutcome> {
        let (path, backend) = self.resolve(path)?;
        backend.edit(&path, old, new, replace_all).await
    }

    async fn delete(&self, path: &str) -> VfsResult<()> {
        let (path, backend) = self.resolve(path)?;
        backend.delete(&path).await
    }

    async fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        let mut merged = BTreeSet::new();
        for backend in self.distinct_backends() {
            for path in backend.glob(pattern).await? {
                if self.owns(backend, &path) {
                    merged.insert(path);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    async fn grep(&self, pattern: &str) -> VfsResult<GrepResult> {
        let mut merged = GrepResult::new();
        for backend in self.distinct_backends() {
            for (path, hits) in backend.grep(pattern).await? {
                if self.owns(backend, &path) {
                    merged.insert(path, hits);
                }
            }
        }
        Ok(merged)
    }
}
