//! Error types for the ingestion pipeline
//!
//! Only run-level failures live here. Per-line and per-file problems are
//! recovered where they happen and show up in logs and worker outcomes.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Provisioning step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Connect,
    EnsureIndex,
    EnsureToken,
    AssociateIndex,
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProvisionStep::Connect => "connect",
            ProvisionStep::EnsureIndex => "ensure index",
            ProvisionStep::EnsureToken => "ensure HEC token",
            ProvisionStep::AssociateIndex => "associate index with HEC token",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// Transport-level failure talking to Splunk
    #[error("Unable to reach Splunk at {url}: {source}. Check the URL, port and proxy settings.")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A provisioning step got an unexpected answer
    #[error("Provisioning failed at step '{step}' (HTTP {status}): {message}")]
    Provisioning {
        step: ProvisionStep,
        status: u16,
        message: String,
    },

    /// Splunk answered but the body did not contain what we needed
    #[error("Unexpected Splunk response during '{step}': {message}")]
    UnexpectedResponse { step: ProvisionStep, message: String },

    /// HEC answered a batch with a non-success status
    #[error("HEC rejected a batch (HTTP {status}): {message}")]
    Delivery { status: u16, message: String },

    #[error("Failed to parse Splunk XML response: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("EVTX conversion failed: {0}")]
    Conversion(String),

    #[error("Input is neither a file nor a directory: {}", .0.display())]
    InvalidInput(PathBuf),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] e2s_common::E2sError),
}

impl IngestError {
    pub fn provisioning(step: ProvisionStep, status: u16, message: impl Into<String>) -> Self {
        Self::Provisioning {
            step,
            status,
            message: message.into(),
        }
    }

    pub fn unexpected(step: ProvisionStep, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            step,
            message: message.into(),
        }
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    /// True for errors raised before any data was converted or shipped
    pub fn is_provisioning(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Provisioning { .. } | Self::UnexpectedResponse { .. }
        )
    }
}
