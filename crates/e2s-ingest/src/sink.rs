//! Destination for normalized payloads
//!
//! Workers only see a [`PayloadSink`]; the HEC client, the test-mode logger and
//! the in-memory collector used by tests all sit behind it.

use e2s_common::NormalizedPayload;
use std::sync::{Arc, Mutex};

/// Accepts payloads from any number of workers.
///
/// `enqueue` must not block on network I/O. It may wait for queue capacity,
/// which is how a slow destination pushes back on the workers. Each worker
/// owns a clone; the delivery side learns that ingestion is over when every
/// clone is dropped.
pub trait PayloadSink: Clone + Send + 'static {
    fn enqueue(&self, payload: NormalizedPayload);
}

/// Keeps every payload in memory
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    payloads: Arc<Mutex<Vec<NormalizedPayload>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything enqueued so far
    pub fn payloads(&self) -> Vec<NormalizedPayload> {
        match self.payloads.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.payloads.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PayloadSink for CollectingSink {
    fn enqueue(&self, payload: NormalizedPayload) {
        match self.payloads.lock() {
            Ok(mut guard) => guard.push(payload),
            Err(poisoned) => poisoned.into_inner().push(payload),
        }
    }
}
