//! Cache generation tools.
//!
//! These inspect and prune the SQLite cache store directly, without going
//! through the worker's event loop.

pub mod list;
pub mod purge;

pub use list::{CacheListParams, list_impl};
pub use purge::{CachePurgeParams, purge_impl};
