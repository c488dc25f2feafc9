//! HTTP Event Collector delivery
//!
//! Workers hold cheap [`HecSink`] clones feeding a bounded channel. A single
//! shipper task owns the batch buffer: it appends each payload in the HEC batch
//! format (concatenated JSON objects) and posts the buffer whenever the next
//! payload would push it past the configured size. When every sink clone is
//! dropped the shipper posts what is left and reports.
//!
//! Once the channel is full, workers wait in `enqueue` until the shipper
//! catches up, so memory stays bounded when Splunk is slower than parsing.
//!
//! Failed batches are logged and counted, never retried.

use e2s_common::{NormalizedPayload, RawRecord};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::client::build_http_client;
use super::endpoints;
use crate::config::{ProxySettings, SplunkSettings};
use crate::error::{IngestError, Result};
use crate::sink::PayloadSink;

/// Wire form of one event inside a batch
#[derive(Serialize)]
struct HecEvent<'a> {
    time: f64,
    host: &'a str,
    source: &'a str,
    sourcetype: &'a str,
    index: &'a str,
    event: &'a RawRecord,
}

/// Serialize `payload` for `index`, as appended to a batch
pub fn encode_event(payload: &NormalizedPayload, index: &str) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&HecEvent {
        time: payload.time,
        host: &payload.host,
        source: &payload.source,
        sourcetype: payload.sourcetype,
        index,
        event: &payload.event,
    })
}

/// Authenticated client for the event endpoint
#[derive(Debug, Clone)]
pub struct HecClient {
    client: Client,
    url: String,
    token: String,
    index: String,
}

impl HecClient {
    pub fn new(
        client: Client,
        hec_base_url: &str,
        token: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: endpoints::collector_event_url(hec_base_url),
            token: token.into(),
            index: index.into(),
        }
    }

    pub fn from_settings(
        settings: &SplunkSettings,
        proxy: &ProxySettings,
        token: impl Into<String>,
        index: impl Into<String>,
    ) -> Result<Self> {
        let client = build_http_client(settings, proxy)?;
        Ok(Self::new(client, &settings.hec_base_url(), token, index))
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Post one batch body
    pub async fn post_batch(&self, body: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, format!("Splunk {}", self.token))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IngestError::Delivery {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Counters reported by the shipper once delivery is over
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub events_sent: u64,
    /// Events in failed batches, or that could not be serialized
    pub events_failed: u64,
    /// Events only logged because delivery was disabled
    pub events_skipped: u64,
}

/// Where enqueued payloads go
#[derive(Debug, Clone)]
pub enum DeliveryMode {
    Hec(HecClient),
    /// Log payloads instead of sending them
    DryRun,
}

#[derive(Debug, Clone)]
enum SinkTarget {
    Channel(mpsc::Sender<NormalizedPayload>),
    DryRun(Arc<AtomicU64>),
}

/// Producer side handed to workers.
///
/// `enqueue` blocks the calling thread while the queue is full. Call it from
/// worker threads (`spawn_blocking`), never from async code.
#[derive(Debug, Clone)]
pub struct HecSink {
    target: SinkTarget,
}

impl PayloadSink for HecSink {
    fn enqueue(&self, payload: NormalizedPayload) {
        match &self.target {
            SinkTarget::Channel(tx) => {
                if tx.blocking_send(payload).is_err() {
                    error!("HEC shipper is gone, dropping event");
                }
            },
            SinkTarget::DryRun(count) => {
                debug!(
                    source = %payload.source,
                    host = %payload.host,
                    time = payload.time,
                    event = ?payload.event,
                    "Test mode, event not sent"
                );
                count.fetch_add(1, Ordering::Relaxed);
            },
        }
    }
}

/// Consumer side, kept by the orchestrator
#[derive(Debug)]
pub enum DeliveryHandle {
    Shipper(JoinHandle<DeliveryReport>),
    DryRun(Arc<AtomicU64>),
}

impl DeliveryHandle {
    /// Wait for the final batch and return the counters.
    ///
    /// Only completes once every [`HecSink`] clone has been dropped.
    pub async fn flush(self) -> DeliveryReport {
        let report = match self {
            DeliveryHandle::Shipper(task) => match task.await {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "HEC shipper task failed");
                    DeliveryReport::default()
                },
            },
            DeliveryHandle::DryRun(count) => DeliveryReport {
                events_skipped: count.load(Ordering::Relaxed),
                ..DeliveryReport::default()
            },
        };

        info!(
            batches_sent = report.batches_sent,
            batches_failed = report.batches_failed,
            events_sent = report.events_sent,
            events_failed = report.events_failed,
            events_skipped = report.events_skipped,
            "Delivery finished"
        );
        report
    }
}

/// Start delivery. Must be called from within a tokio runtime.
///
/// At most `queue_capacity` payloads wait for the shipper; a zero capacity is
/// raised to one.
pub fn start_delivery(
    mode: DeliveryMode,
    max_batch_bytes: usize,
    queue_capacity: usize,
) -> (HecSink, DeliveryHandle) {
    match mode {
        DeliveryMode::Hec(client) => {
            let (tx, rx) = mpsc::channel(queue_capacity.max(1));
            let shipper = Shipper::new(client, max_batch_bytes);
            let task = tokio::spawn(shipper.run(rx));
            (
                HecSink {
                    target: SinkTarget::Channel(tx),
                },
                DeliveryHandle::Shipper(task),
            )
        },
        DeliveryMode::DryRun => {
            info!("Test mode enabled, no event will be sent to Splunk");
            let count = Arc::new(AtomicU64::new(0));
            (
                HecSink {
                    target: SinkTarget::DryRun(count.clone()),
                },
                DeliveryHandle::DryRun(count),
            )
        },
    }
}

struct Shipper {
    client: HecClient,
    max_batch_bytes: usize,
    buffer: Vec<u8>,
    buffered_events: u64,
    report: DeliveryReport,
}

impl Shipper {
    fn new(client: HecClient, max_batch_bytes: usize) -> Self {
        Self {
            client,
            max_batch_bytes,
            buffer: Vec::with_capacity(max_batch_bytes),
            buffered_events: 0,
            report: DeliveryReport::default(),
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<NormalizedPayload>) -> DeliveryReport {
        while let Some(payload) = rx.recv().await {
            self.push(&payload).await;
        }

        self.ship().await;
        self.report
    }

    async fn push(&mut self, payload: &NormalizedPayload) {
        let encoded = match encode_event(payload, self.client.index()) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(source = %payload.source, error = %e, "Unable to serialize event");
                self.report.events_failed += 1;
                return;
            },
        };

        if !self.buffer.is_empty() && self.buffer.len() + encoded.len() > self.max_batch_bytes {
            self.ship().await;
        }

        self.buffer.extend_from_slice(&encoded);
        self.buffered_events += 1;
    }

    async fn ship(&mut self) {
        if self.buffered_events == 0 {
            return;
        }

        let body = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.max_batch_bytes));
        let events = std::mem::take(&mut self.buffered_events);
        let bytes = body.len();

        match self.client.post_batch(body).await {
            Ok(()) => {
                debug!(events, bytes, "Batch sent");
                self.report.batches_sent += 1;
                self.report.events_sent += events;
            },
            Err(e) => {
                error!(events, bytes, error = %e, "Batch rejected, events dropped");
                self.report.batches_failed += 1;
                self.report.events_failed += events;
            },
        }
    }
}
