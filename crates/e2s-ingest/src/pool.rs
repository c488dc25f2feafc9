//! Worker pool
//!
//! One blocking task per dispatch list. Each worker streams its files through
//! the [`RecordTransformer`] into its own clone of the sink and reports a
//! [`WorkerOutcome`]. The pool returns once every worker has drained its list.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::dispatch::DispatchList;
use crate::progress::WorkerProgress;
use crate::sink::PayloadSink;
use crate::transform::RecordTransformer;

/// Prefix of the `source` field; the file name follows
pub const SOURCE_PREFIX: &str = "event_";

/// Per-worker counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub worker: usize,
    pub files_attempted: u64,
    pub files_succeeded: u64,
    /// Payloads handed to the sink
    pub payloads: u64,
}

impl WorkerOutcome {
    pub fn files_failed(&self) -> u64 {
        self.files_attempted - self.files_succeeded
    }
}

/// Result of processing one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// At least one record was parsed
    Ingested { payloads: u64 },
    /// Unreadable, or no line parsed
    Failed,
}

/// `source` value for payloads coming from `path`
pub fn source_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    format!("{}{}", SOURCE_PREFIX, name)
}

/// Stream one converted file into `sink`
pub fn process_file<S: PayloadSink>(
    path: &Path,
    transformer: &RecordTransformer,
    sink: &S,
) -> FileStatus {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Unable to open converted file");
            return FileStatus::Failed;
        },
    };

    let source = source_name(path);
    match transformer.transform_stream(BufReader::new(file), &source, sink) {
        Ok(stats) if stats.parsed > 0 => {
            debug!(
                file = %path.display(),
                parsed = stats.parsed,
                skipped = stats.skipped,
                host = stats.host.as_deref().unwrap_or_default(),
                "File ingested"
            );
            FileStatus::Ingested {
                payloads: stats.parsed,
            }
        },
        Ok(stats) => {
            warn!(
                file = %path.display(),
                skipped = stats.skipped,
                "No valid record in file"
            );
            FileStatus::Failed
        },
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Read error while ingesting file");
            FileStatus::Failed
        },
    }
}

fn run_worker<S: PayloadSink>(
    worker: usize,
    list: DispatchList,
    transformer: Arc<RecordTransformer>,
    sink: S,
    progress: indicatif::ProgressBar,
) -> WorkerOutcome {
    let mut outcome = WorkerOutcome {
        worker,
        ..WorkerOutcome::default()
    };

    for path in &list.files {
        if let Some(name) = path.file_name() {
            progress.set_message(name.to_string_lossy().into_owned());
        }

        outcome.files_attempted += 1;
        if let FileStatus::Ingested { payloads } = process_file(path, &transformer, &sink) {
            outcome.files_succeeded += 1;
            outcome.payloads += payloads;
        }
        progress.inc(1);
    }

    progress.finish_with_message("done");
    debug!(
        worker,
        attempted = outcome.files_attempted,
        succeeded = outcome.files_succeeded,
        "Worker finished"
    );

    outcome
}

/// Run one worker per list and wait for all of them.
///
/// The sink is moved in and dropped once every worker is done, which is what
/// lets the delivery side finish its final flush.
pub async fn run_workers<S: PayloadSink>(
    lists: Vec<DispatchList>,
    transformer: Arc<RecordTransformer>,
    sink: S,
    progress: &WorkerProgress,
) -> Vec<WorkerOutcome> {
    info!(workers = lists.len(), "Starting workers");

    let mut assigned = Vec::with_capacity(lists.len());
    let mut handles = Vec::with_capacity(lists.len());
    for (worker, list) in lists.into_iter().enumerate() {
        let files = list.files.len() as u64;
        let bar = progress.worker_bar(worker, files);
        let transformer = transformer.clone();
        let sink = sink.clone();

        assigned.push(files);
        handles.push(tokio::task::spawn_blocking(move || {
            run_worker(worker, list, transformer, sink, bar)
        }));
    }
    drop(sink);

    let outcomes: Vec<WorkerOutcome> = futures::future::join_all(handles)
        .await
        .into_iter()
        .zip(assigned)
        .enumerate()
        .map(|(worker, (result, files))| match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(worker, error = %e, "Worker panicked");
                WorkerOutcome {
                    worker,
                    files_attempted: files,
                    ..WorkerOutcome::default()
                }
            },
        })
        .collect();

    let attempted: u64 = outcomes.iter().map(|o| o.files_attempted).sum();
    let succeeded: u64 = outcomes.iter().map(|o| o.files_succeeded).sum();
    info!(attempted, succeeded, "All workers completed");

    outcomes
}
