//! Structured errors for the sw-host tools.
//!
//! Cache and lifecycle failures use `swcache_core::Error`; these cover tool
//! input and the passthrough fetch.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Structured errors for the sw-host tools.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., unknown request mode).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A request the worker left alone failed on the network.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Tool output could not be encoded.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::Network(msg) => (-32010, msg.clone()),
            ToolError::Serialize(msg) => (-32603, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::Serialize(err.to_string())
    }
}
