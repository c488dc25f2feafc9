//! Event record model
//!
//! Records come from `evtx_dump -o jsonl`: one JSON object per line, with the
//! interesting metadata nested under `Event.System`. The accessors here are the
//! only place that knows those paths.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Source type attached to every payload sent to the collector
pub const SOURCETYPE_JSON: &str = "json";

const COMPUTER_PATH: &[&str] = &["Event", "System", "Computer"];
const CHANNEL_PATH: &[&str] = &["Event", "System", "Channel"];
const SYSTEM_TIME_PATH: &[&str] = &["Event", "System", "TimeCreated", "#attributes", "SystemTime"];
const PROVIDER_PATH: &[&str] = &["Event", "System", "Provider", "#attributes", "Name"];
const EVENT_ID_PATH: &[&str] = &["Event", "System", "EventID"];

/// One decoded event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Parse a single JSON line. Anything but a JSON object is rejected.
    pub fn parse_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Map<String, Value>>(line).map(Self)
    }

    /// Same as [`RawRecord::parse_line`] on raw bytes; invalid UTF-8 is a parse error.
    pub fn parse_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice::<Map<String, Value>>(bytes).map(Self)
    }

    /// Name of the machine that produced the event
    pub fn computer(&self) -> Option<&str> {
        self.lookup(COMPUTER_PATH).and_then(Value::as_str)
    }

    /// Event log channel, e.g. `Security` or `System`
    pub fn channel(&self) -> Option<&str> {
        self.lookup(CHANNEL_PATH).and_then(Value::as_str)
    }

    /// Raw `SystemTime` attribute of `TimeCreated`
    pub fn system_time(&self) -> Option<&str> {
        self.lookup(SYSTEM_TIME_PATH).and_then(Value::as_str)
    }

    /// Provider name, used as the first resolver key
    pub fn provider(&self) -> Option<&str> {
        self.lookup(PROVIDER_PATH).and_then(Value::as_str)
    }

    /// Event identifier in either of its two encodings
    pub fn event_id(&self) -> Option<EventId> {
        self.lookup(EVENT_ID_PATH)
            .and_then(|value| EventId::deserialize(value).ok())
    }

    /// Set a top-level field, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Read a top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.0.get(*first)?, |value, key| value.get(*key))
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// `EventID` as emitted by evtx_dump.
///
/// Events without qualifiers carry a bare scalar (`"EventID": 4624`); events
/// with qualifiers wrap it (`"EventID": {"#attributes": {...}, "#text": 7036}`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Wrapped {
        #[serde(rename = "#text")]
        text: EventIdValue,
    },
    Plain(EventIdValue),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EventIdValue {
    Number(u64),
    Text(String),
}

impl EventId {
    /// The scalar value regardless of encoding
    pub fn value(&self) -> &EventIdValue {
        match self {
            EventId::Wrapped { text } => text,
            EventId::Plain(value) => value,
        }
    }

    /// Key used in the resolver table
    pub fn key(&self) -> String {
        self.value().to_string()
    }
}

impl fmt::Display for EventIdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventIdValue::Number(n) => write!(f, "{}", n),
            EventIdValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Envelope handed to the delivery client for one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedPayload {
    pub source: String,
    pub sourcetype: &'static str,
    pub host: String,
    /// Unix epoch seconds, UTC
    pub time: f64,
    pub event: RawRecord,
}
