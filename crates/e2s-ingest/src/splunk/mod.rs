//! Splunk integration
//!
//! - [`client`]: management REST client (basic auth)
//! - [`provision`]: index, HEC token and association setup
//! - [`hec`]: batched event delivery through the HTTP Event Collector

pub mod client;
pub mod endpoints;
pub mod hec;
pub mod provision;
pub mod xml;

pub use client::SplunkClient;
pub use hec::{start_delivery, DeliveryHandle, DeliveryMode, DeliveryReport, HecClient, HecSink};
pub use provision::{ProvisionState, Provisioner, ProvisioningState};
