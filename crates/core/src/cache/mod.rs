//! SQLite-backed storage for the offline worker.
//!
//! Persistent storage with async access via tokio-rusqlite:
//!
//! - Versioned cache generations keyed by request identity (method + URL)
//! - Local mirror of the push subscription
//! - Opaque record log for page data
//! - Automatic schema migrations, WAL mode

pub mod connection;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod records;
pub mod subscriptions;

pub use crate::Error;

pub use connection::CacheDb;
pub use generations::{CachedResponse, GenerationInfo};
pub use hash::RequestKey;
pub use records::{Record, RecordExport, RecordQuery, RecordStats, SortOrder};
pub use subscriptions::{PushSubscriptionRecord, SubscriptionKeys};
