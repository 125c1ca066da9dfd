//! Host-side tool errors.
//!
//! Worker and storage failures already map through `pwa_core::Error`; these
//! cover what only the tool layer can get wrong.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Tool arguments that do not describe a valid event.
    #[error("INVALID_PARAMS: {0}")]
    InvalidParams(String),

    /// The worker answered an event with the wrong kind of outcome.
    #[error("UNEXPECTED_OUTCOME: {0} event")]
    UnexpectedOutcome(&'static str),

    #[error("ENCODE_FAILED: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<HostError> for McpError {
    fn from(err: HostError) -> Self {
        let code = match &err {
            HostError::InvalidParams(_) => -32602,
            HostError::UnexpectedOutcome(_) => -32603,
            HostError::Encode(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
