//! evtx2splunk Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup, and error handling for the evtx2splunk workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`E2sError`] and the crate [`Result`] alias
//! - **Types**: the event record model ([`RawRecord`], [`EventId`]) and the
//!   [`NormalizedPayload`] envelope shipped to the collector
//! - **Logging**: `tracing` subscriber configuration shared by all binaries
//!
//! # Example
//!
//! ```no_run
//! use e2s_common::types::RawRecord;
//!
//! let line = r#"{"Event":{"System":{"Computer":"WKS-01","Channel":"Security"}}}"#;
//! let record = RawRecord::parse_line(line).unwrap();
//! assert_eq!(record.computer(), Some("WKS-01"));
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{E2sError, Result};
pub use types::{EventId, NormalizedPayload, RawRecord};
