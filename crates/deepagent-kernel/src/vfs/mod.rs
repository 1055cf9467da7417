//! Virtual filesystem for agent tools.
//!
//! Key components:
//!
//! - [`FilesystemOps`] - the capability set (read, write, edit, list,
//!   delete, glob, grep)
//! - [`StateBackend`] - entries owned by one thread, snapshotted with it
//! - [`StoreBackend`] - entries in a durable collection shared by threads
//! - [`Router`] - dispatches by longest path prefix to the backends above
//! - [`Backend`] - the closed enum over all three
//!
//! ## Design Decisions
//!
//! - **Flat namespace**: there are no directories, only entries whose paths
//!   contain `/`. Listing a "directory" is a prefix query.
//! - **Full paths everywhere**: the router never strips the matched prefix,
//!   so backends are unaware of where they are mounted.
//! - **Glob**: `*` stays within one path segment, `**` crosses segments.
//! - **Delete is not idempotent**: deleting a missing path is `NotFound`.

mod backend;
pub mod backends;
mod error;
mod ops;
mod path;
mod pattern;
mod router;
mod types;

pub use backend::Backend;
pub use backends::{StateBackend, StoreBackend};
pub use error::{VfsError, VfsResult};
pub use ops::FilesystemOps;
pub use path::{is_under, normalize_file_path, normalize_path};
pub use pattern::{GlobPattern, LinePattern, replace_in};
pub use router::{Route, Router, normalize_route_prefix};
pub use types::{EditOutcome, Entry, FileInfo, GrepMatch, GrepResult};
