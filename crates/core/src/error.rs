//! Unified error types for the offline worker.
//!
//! Two kinds of failure flow through the workspace:
//!
//! - [`Error`] is fatal for the operation that produced it and is propagated
//!   with `?` up to the event that triggered it.
//! - [`Warning`] is recoverable: the operation continues, the warning is logged
//!   and carried in the operation's report.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the offline worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A URL could not be parsed or resolved against the origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The platform lacks a required API.
    #[error("CAPABILITY_UNSUPPORTED: {0}")]
    CapabilityUnsupported(String),

    /// The user declined a permission prompt.
    #[error("PERMISSION_DENIED: {0}")]
    PermissionDenied(String),

    /// A network fetch was rejected, timed out or aborted.
    #[error("NETWORK_FAILURE: {0}")]
    NetworkFailure(String),

    /// A push payload could not be decoded.
    #[error("PAYLOAD_PARSE_FAILURE: {0}")]
    PayloadParse(String),

    /// The worker is not in a state that allows the operation.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// An operation required an active push subscription.
    #[error("NOT_SUBSCRIBED")]
    NotSubscribed,

    /// No record found for the given id.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Database operation failed.
    #[error("STORAGE_FAILURE: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_FAILURE: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored data could not be (de)serialized.
    #[error("STORAGE_FAILURE: corrupt entry: {0}")]
    Corrupt(String),
}

impl Error {
    /// Whether this error came from the cache store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Database(_) | Error::MigrationFailed(_) | Error::Corrupt(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Corrupt(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::CapabilityUnsupported(msg) => (-32020, msg.clone()),
            Error::PermissionDenied(msg) => (-32021, msg.clone()),
            Error::NetworkFailure(msg) => (-32022, msg.clone()),
            Error::PayloadParse(msg) => (-32023, msg.clone()),
            Error::InvalidState(msg) => (-32024, msg.clone()),
            Error::NotSubscribed => (-32025, "No active push subscription".to_string()),
            Error::NotFound(msg) => (-32001, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::Corrupt(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

/// A recoverable failure.
///
/// Returned as `Result<T, Warning>` by best-effort steps (cache population,
/// subscription mirroring, stale-cache cleanup) and collected into reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Warning {
    /// A critical asset could not be fetched or stored during install.
    #[error("asset not cached: {url} ({reason})")]
    AssetUnavailable { url: String, reason: String },

    /// A background cache write was rejected.
    #[error("cache write failed for {url}: {reason}")]
    CacheWrite { url: String, reason: String },

    /// A cache read failed and the request fell through to the network.
    #[error("cache read failed for {url}: {reason}")]
    CacheRead { url: String, reason: String },

    /// A stale generation could not be deleted during activation.
    #[error("failed to delete cache {name}: {reason}")]
    CleanupFailed { name: String, reason: String },

    /// Claiming open clients failed during activation.
    #[error("failed to claim clients: {0}")]
    ClaimFailed(String),

    /// Push payload was not structured data and was treated as text.
    #[error("push payload is not JSON, using text body: {0}")]
    PayloadFallback(String),

    /// The subscription mirror rejected an update.
    #[error("subscription mirror failed: {0}")]
    MirrorFailed(String),
}
