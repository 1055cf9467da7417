//! Backend implementations.
//!
//! - [`StateBackend`]: entries live inside one thread's state and are
//!   snapshotted with it
//! - [`StoreBackend`]: entries live in an [`EntryStore`](crate::storage::EntryStore)
//!   collection shared by every thread

mod state;
mod store;

pub use state::StateBackend;
pub use store::StoreBackend;
