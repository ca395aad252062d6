//! Error types for treewalk-mcp.
//!
//! Configuration errors stop the process before the server starts. Tool
//! errors are produced while handling a single `tools/call` and never end
//! the session; the dispatcher turns them into a JSON-RPC error or a
//! structured error result.

use std::path::PathBuf;

use thiserror::Error;

use serde_json::{json, Value};

use crate::scan::ScanError;
use crate::session::SessionError;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised by tool handlers.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A parameter was missing, mistyped, or out of range.
    #[error("Invalid parameter '{param}': {message}")]
    Validation {
        /// Parameter name.
        param: String,
        /// Description of what's wrong.
        message: String,
    },

    /// The target path is missing or cannot be read.
    #[error(transparent)]
    Resource(ScanError),

    /// The stream session does not exist (never created, stopped, or expired).
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// The session id supplied by the caller.
        session_id: String,
    },

    /// The path lies outside the configured allowed directories.
    #[error("Access denied: '{path}' is outside the configured allowed directories")]
    AccessDenied {
        /// The path as supplied by the caller.
        path: String,
    },

    /// Unexpected failure inside a handler.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl ToolError {
    /// Convenience constructor for validation failures.
    pub fn validation(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Stable tag identifying the error category in structured results.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Resource(_) => "resource_error",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::AccessDenied { .. } => "access_denied",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Category-specific fields merged into the structured error result.
    #[must_use]
    pub fn details(&self) -> Value {
        match self {
            Self::Validation { param, .. } => json!({ "parameter": param }),
            Self::Resource(scan) => scan
                .path()
                .map_or_else(|| json!({}), |p| json!({ "path": p.display().to_string() })),
            Self::SessionNotFound { session_id } => json!({ "session_id": session_id }),
            Self::AccessDenied { path } => json!({ "path": path }),
            Self::Internal { .. } => json!({}),
        }
    }
}

impl From<ScanError> for ToolError {
    fn from(error: ScanError) -> Self {
        match error {
            ScanError::InvalidPattern { pattern, message } => Self::Validation {
                param: "pattern".to_string(),
                message: format!("invalid glob '{pattern}': {message}"),
            },
            other => Self::Resource(other),
        }
    }
}

impl From<SessionError> for ToolError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::NotFound { session_id } => Self::SessionNotFound { session_id },
            SessionError::Scan(scan) => scan.into(),
        }
    }
}
