//! Event-id resolution
//!
//! Maps `(provider, event id)` to the message template Windows would render
//! for that event. The table is produced offline from a winevt-kb database and
//! loaded once; workers share it read-only.

use e2s_common::{E2sError, RawRecord, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// provider -> event id -> message template
pub type ResolverTable = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    table: ResolverTable,
}

impl Resolver {
    pub fn new(table: ResolverTable) -> Self {
        Self { table }
    }

    /// Load the table from a UTF-8 JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let table: ResolverTable = serde_json::from_str(&content).map_err(|e| {
            E2sError::parse(format!("Invalid resolver table {}: {}", path.display(), e))
        })?;

        let templates: usize = table.values().map(HashMap::len).sum();
        info!(
            path = %path.display(),
            providers = table.len(),
            templates,
            "Loaded event id resolution table"
        );

        Ok(Self { table })
    }

    /// Template for a provider/event id pair
    pub fn lookup(&self, provider: &str, event_id: &str) -> Option<&str> {
        self.table
            .get(provider)
            .and_then(|events| events.get(event_id))
            .map(String::as_str)
    }

    /// Template for a record, if its provider and event id are known.
    /// Records missing either field simply do not resolve.
    pub fn resolve(&self, record: &RawRecord) -> Option<&str> {
        let provider = record.provider()?;
        let event_id = record.event_id()?;
        self.lookup(provider, &event_id.key())
            .filter(|template| !template.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table() -> Resolver {
        let table: ResolverTable = serde_json::from_str(
            r#"{
                "Microsoft-Windows-Security-Auditing": {
                    "4624": "An account was successfully logged on.",
                    "1102": ""
                },
                "Service Control Manager": {
                    "7036": "The {1} service entered the {2} state."
                }
            }"#,
        )
        .unwrap();
        Resolver::new(table)
    }

    fn record(provider: &str, event_id: &str) -> RawRecord {
        let line = format!(
            r##"{{"Event":{{"System":{{"Provider":{{"#attributes":{{"Name":"{}"}}}},"EventID":{}}}}}}}"##,
            provider, event_id
        );
        RawRecord::parse_line(&line).unwrap()
    }

    #[test]
    fn test_resolve_plain_and_wrapped_ids() {
        let resolver = table();

        let plain = record("Microsoft-Windows-Security-Auditing", "4624");
        assert_eq!(
            resolver.resolve(&plain),
            Some("An account was successfully logged on.")
        );

        let wrapped = record(
            "Service Control Manager",
            r##"{"#attributes":{"Qualifiers":16384},"#text":7036}"##,
        );
        assert_eq!(
            resolver.resolve(&wrapped),
            Some("The {1} service entered the {2} state.")
        );
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let resolver = table();
        let rec = record("Service Control Manager", "7036");

        assert_eq!(resolver.resolve(&rec), resolver.resolve(&rec));
    }

    #[test]
    fn test_unknown_or_malformed_records_do_not_resolve() {
        let resolver = table();

        assert_eq!(resolver.resolve(&record("Unknown-Provider", "4624")), None);
        assert_eq!(
            resolver.resolve(&record("Microsoft-Windows-Security-Auditing", "9999")),
            None
        );
        // Empty templates count as unresolved
        assert_eq!(
            resolver.resolve(&record("Microsoft-Windows-Security-Auditing", "1102")),
            None
        );

        let bare = RawRecord::parse_line(r#"{"Event":{"System":{"EventID":4624}}}"#).unwrap();
        assert_eq!(resolver.resolve(&bare), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"EventLog": {{"6005": "The Event log service was started."}}}}"#).unwrap();

        let resolver = Resolver::load(file.path()).unwrap();
        assert_eq!(
            resolver.lookup("EventLog", "6005"),
            Some("The Event log service was started.")
        );
    }

    #[test]
    fn test_load_rejects_malformed_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();

        assert!(Resolver::load(file.path()).is_err());
        assert!(Resolver::load(Path::new("/nonexistent/evtx_data.json")).is_err());
    }
}
