//! Record normalization
//!
//! Turns a stream of JSON lines from one converted file into HEC payloads:
//! the host is pinned per file, timestamps become UTC epoch seconds, and the
//! record gains `module` and, when available, the resolved `message`.

use chrono::{DateTime, NaiveDateTime, Utc};
use e2s_common::types::SOURCETYPE_JSON;
use e2s_common::{NormalizedPayload, RawRecord};
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::resolver::Resolver;
use crate::sink::PayloadSink;

/// `SystemTime` with fractional seconds, e.g. `2020-06-16T12:54:38.766579Z`
pub const FRACTIONAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// `SystemTime` without fractional seconds, e.g. `2020-06-16T12:54:38Z`
pub const WHOLE_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Host used when the first record of a file does not name its computer
pub const UNKNOWN_HOST: &str = "unknown";

/// Parse an evtx `SystemTime` value as UTC
pub fn parse_system_time(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, FRACTIONAL_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, WHOLE_SECONDS_FORMAT))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Epoch seconds with microsecond precision
pub fn epoch_seconds(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp_micros() as f64 / 1_000_000.0
}

/// Epoch time for a record. Missing or unparseable values fall back to now so
/// that odd forensic timestamps never cost us the event. Values before the Unix
/// epoch, such as the zero FILETIME `1601-01-01T00:00:00Z`, count as
/// unparseable.
pub fn normalize_timestamp(raw: Option<&str>) -> f64 {
    let parsed = raw
        .and_then(parse_system_time)
        .filter(|timestamp| timestamp.timestamp() >= 0);

    match parsed {
        Some(timestamp) => epoch_seconds(timestamp),
        None => {
            warn!(
                timestamp = raw.unwrap_or("<missing>"),
                "Unable to parse event timestamp, falling back to current time"
            );
            epoch_seconds(Utc::now())
        },
    }
}

/// Counters for one transformed stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Lines parsed and handed to the sink
    pub parsed: u64,
    /// Lines that were not JSON objects
    pub skipped: u64,
    /// Host pinned from the first parsed record
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordTransformer {
    resolver: Option<Arc<Resolver>>,
}

impl RecordTransformer {
    /// `None` disables event id resolution
    pub fn new(resolver: Option<Arc<Resolver>>) -> Self {
        Self { resolver }
    }

    pub fn resolves(&self) -> bool {
        self.resolver.is_some()
    }

    /// Build the payload for one record
    pub fn transform(&self, mut record: RawRecord, source: &str, host: &str) -> NormalizedPayload {
        let time = normalize_timestamp(record.system_time());

        if let Some(channel) = record.channel().map(str::to_owned) {
            record.insert("module", channel);
        }

        if let Some(resolver) = &self.resolver {
            if let Some(message) = resolver.resolve(&record).map(str::to_owned) {
                record.insert("message", message);
            }
        }

        NormalizedPayload {
            source: source.to_string(),
            sourcetype: SOURCETYPE_JSON,
            host: host.to_string(),
            time,
            event: record,
        }
    }

    /// Transform every line of `reader`, in order, into `sink`.
    ///
    /// Lines that are not JSON objects are skipped. Only read errors abort
    /// the stream.
    pub fn transform_stream<R, S>(
        &self,
        mut reader: R,
        source: &str,
        sink: &S,
    ) -> std::io::Result<StreamStats>
    where
        R: BufRead,
        S: PayloadSink,
    {
        let mut stats = StreamStats::default();
        let mut line = Vec::with_capacity(4096);

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }

            let record = match RawRecord::parse_slice(&line) {
                Ok(record) => record,
                Err(e) => {
                    debug!(source, error = %e, "Skipping unparseable line");
                    stats.skipped += 1;
                    continue;
                },
            };

            let host = stats.host.get_or_insert_with(|| {
                record.computer().unwrap_or(UNKNOWN_HOST).to_string()
            });

            sink.enqueue(self.transform(record, source, host));
            stats.parsed += 1;
        }

        Ok(stats)
    }
}
