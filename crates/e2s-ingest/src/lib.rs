//! evtx2splunk Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Converts Windows EVTX logs to JSON lines and ships every record to a Splunk
//! HTTP Event Collector.
//!
//! # Overview
//!
//! - [`config`]: deployment [`Settings`](config::Settings) and per-run
//!   [`IngestOptions`](config::IngestOptions)
//! - [`convert`]: `evtx_dump` wrapper
//! - [`dispatch`]: size-balanced work lists
//! - [`pool`]: worker pool streaming files into a [`sink::PayloadSink`]
//! - [`transform`] and [`resolver`]: record normalization
//! - [`splunk`]: provisioning and HEC delivery
//! - [`pipeline`]: the orchestrator tying it together
//!
//! # Example
//!
//! ```no_run
//! use e2s_ingest::config::{IngestOptions, Settings};
//! use e2s_ingest::pipeline::IngestPipeline;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = IngestPipeline::new(Settings::from_env()?, IngestOptions::default());
//!     let summary = pipeline.run(Path::new("./evtx")).await?;
//!     println!("{} files ingested", summary.files_succeeded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod resolver;
pub mod sink;
pub mod splunk;
pub mod transform;

pub use error::{IngestError, Result};
pub use pipeline::{IngestPipeline, IngestSummary};
