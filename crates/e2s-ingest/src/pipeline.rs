//! Ingestion orchestrator
//!
//! Runs one ingestion end to end:
//!
//! 1. load the event-id resolution table
//! 2. provision Splunk (index, HEC token, association)
//! 3. convert the EVTX input to JSON lines, unless the cache is reused
//! 4. discover converted files and dispatch them across workers
//! 5. stream every file through the worker pool into the delivery sink
//! 6. flush delivery, then remove the intermediate directory
//!
//! Provisioning failures abort before anything is converted or sent.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::{IngestOptions, Settings};
use crate::convert::{EvtxDump, InputKind, InputPlan};
use crate::dispatch::{discover_files, dispatch_by_size};
use crate::error::Result;
use crate::pool::{run_workers, WorkerOutcome};
use crate::progress::{format_bytes, WorkerProgress};
use crate::resolver::Resolver;
use crate::splunk::{
    start_delivery, DeliveryMode, DeliveryReport, HecClient, Provisioner, SplunkClient,
};
use crate::transform::RecordTransformer;

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub files_attempted: u64,
    pub files_succeeded: u64,
    /// Payloads handed to delivery
    pub payloads: u64,
    pub workers: Vec<WorkerOutcome>,
    pub delivery: DeliveryReport,
    pub elapsed: Duration,
}

impl IngestSummary {
    pub fn files_failed(&self) -> u64 {
        self.files_attempted - self.files_succeeded
    }
}

pub struct IngestPipeline {
    settings: Settings,
    options: IngestOptions,
}

impl IngestPipeline {
    pub fn new(settings: Settings, options: IngestOptions) -> Self {
        Self { settings, options }
    }

    /// Ingest a single EVTX file or a directory of them
    pub async fn run(&self, input: &Path) -> Result<IngestSummary> {
        let started = Instant::now();

        let resolver = self.load_resolver()?;

        let client = SplunkClient::new(&self.settings.splunk, &self.options.proxy)?;
        let provisioned = Provisioner::new(client, self.options.index.clone())
            .provision()
            .await?;

        let plan = InputPlan::for_input(input)?;
        let workers = match plan.kind {
            InputKind::File => 1,
            InputKind::Directory => self.options.workers.max(1),
        };

        if self.options.use_cache {
            info!(dir = %plan.output_dir.display(), "Reusing previously converted files");
        } else {
            EvtxDump::new(&self.settings.converter).convert(&plan).await?;
        }

        let transformer = Arc::new(RecordTransformer::new(resolver));

        let files = discover_files(&plan.output_dir)?;
        let total_bytes: u64 = files.iter().map(|f| f.size).sum();
        info!(
            files = files.len(),
            size = %format_bytes(total_bytes),
            workers,
            resolve = transformer.resolves(),
            "Starting ingestion"
        );
        let lists = dispatch_by_size(files, workers);

        let mode = if self.options.testing {
            DeliveryMode::DryRun
        } else {
            DeliveryMode::Hec(HecClient::from_settings(
                &self.settings.splunk,
                &self.options.proxy,
                provisioned.token,
                provisioned.index,
            )?)
        };
        let (sink, delivery) = start_delivery(
            mode,
            self.settings.splunk.max_batch_bytes,
            self.settings.splunk.queue_capacity,
        );

        let progress = WorkerProgress::new(self.options.show_progress);
        let outcomes = run_workers(lists, transformer, sink, &progress).await;

        let report = delivery.flush().await;

        if !self.options.keep_cache {
            self.remove_cache(&plan.output_dir).await;
        }

        let summary = IngestSummary {
            files_attempted: outcomes.iter().map(|o| o.files_attempted).sum(),
            files_succeeded: outcomes.iter().map(|o| o.files_succeeded).sum(),
            payloads: outcomes.iter().map(|o| o.payloads).sum(),
            workers: outcomes,
            delivery: report,
            elapsed: started.elapsed(),
        };

        info!(
            attempted = summary.files_attempted,
            succeeded = summary.files_succeeded,
            failed = summary.files_failed(),
            payloads = summary.payloads,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Ingestion completed"
        );

        Ok(summary)
    }

    fn load_resolver(&self) -> Result<Option<Arc<Resolver>>> {
        if !self.options.resolve {
            info!("Event id resolution disabled");
            return Ok(None);
        }

        let path = &self.settings.resolver_file;
        if !path.exists() {
            warn!(
                path = %path.display(),
                "Resolution table not found, event ids will not be resolved"
            );
            return Ok(None);
        }

        let resolver = Resolver::load(path)?;
        if resolver.is_empty() {
            warn!(path = %path.display(), "Resolution table is empty");
        }
        Ok(Some(Arc::new(resolver)))
    }

    async fn remove_cache(&self, dir: &Path) {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => info!(dir = %dir.display(), "Removed converted files"),
            Err(e) => warn!(dir = %dir.display(), error = %e, "Unable to remove converted files"),
        }
    }
}
