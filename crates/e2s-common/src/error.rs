//! Error types for evtx2splunk

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, E2sError>;

/// Main error type shared across the workspace
#[derive(Error, Debug)]
pub enum E2sError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl E2sError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
