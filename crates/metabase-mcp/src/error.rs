//! Error types for the MCP crate.
//!
//! [`MetabaseError`] is the closed set of failures an operation can produce.
//! [`McpError`] wraps it at the JSON-RPC boundary together with protocol
//! level failures.

use crate::client::TransportError;
use crate::operation::Operation;
use crate::protocol::{INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST};
use metabase_core::ConfigError;
use thiserror::Error;

/// Failures produced by the session manager and operation handlers.
#[derive(Debug, Error)]
pub enum MetabaseError {
    /// Missing or invalid startup configuration.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Metabase rejected the credentials or the session endpoint was unreachable.
    #[error("failed to authenticate with Metabase: {source}")]
    Authentication {
        #[source]
        source: TransportError,
    },

    /// A data operation failed upstream.
    #[error("failed to {}: {source}", .operation.describe(.target.as_deref()))]
    Upstream {
        operation: Operation,
        target: Option<String>,
        #[source]
        source: TransportError,
    },
}

/// Discriminant of [`MetabaseError`], for logging and structured error data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    Upstream,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Upstream => "upstream",
        }
    }
}

impl MetabaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetabaseError::Configuration(_) => ErrorKind::Configuration,
            MetabaseError::Authentication { .. } => ErrorKind::Authentication,
            MetabaseError::Upstream { .. } => ErrorKind::Upstream,
        }
    }
}

/// Errors that can occur in the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Tool not found.
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// Invalid arguments for tool.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Resource URI does not match any template.
    #[error("unknown resource: {uri}")]
    ResourceNotFound { uri: String },

    /// The Metabase operation itself failed.
    #[error(transparent)]
    Metabase(#[from] MetabaseError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl McpError {
    /// JSON-RPC error code reported for this error.
    pub fn code(&self) -> i32 {
        match self {
            McpError::InvalidRequest(_) => INVALID_REQUEST,
            McpError::ToolNotFound { .. }
            | McpError::InvalidArguments { .. }
            | McpError::ResourceNotFound { .. } => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        }
    }
}
