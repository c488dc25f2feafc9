//! Configuration management
//!
//! Two layers of configuration reach the pipeline:
//!
//! - [`Settings`]: deployment settings (Splunk endpoints, credentials, helper
//!   binaries), read once from the environment and an optional `.env` file.
//! - [`IngestOptions`]: per-run choices made on the command line.
//!
//! Both are plain values handed to [`crate::pipeline::IngestPipeline`]; nothing
//! downstream reads the environment.

use e2s_common::{E2sError, Result};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default Splunk host name.
pub const DEFAULT_SPLUNK_HOST: &str = "localhost";

/// Default Splunk management (REST) port.
pub const DEFAULT_MANAGEMENT_PORT: u16 = 8089;

/// Default HTTP Event Collector port.
pub const DEFAULT_HEC_PORT: u16 = 8088;

/// Default timeout for a single HTTP request in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default HEC batch size in bytes before a batch is posted.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 100_000;

/// Default number of events waiting for the HEC shipper before workers stall.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Default location of the event-id resolution table.
pub const DEFAULT_RESOLVER_FILE: &str = "evtx_data.json";

/// Default `evtx_dump` binary, looked up on PATH.
pub const DEFAULT_EVTX_DUMP_BIN: &str = "evtx_dump";

/// Default `fd` binary. Debian and Ubuntu ship it as `fdfind`.
pub const DEFAULT_FDFIND_BIN: &str = "fdfind";

/// Default target index.
pub const DEFAULT_INDEX: &str = "winevt";

/// Deployment settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub splunk: SplunkSettings,
    pub converter: ConverterSettings,
    /// Path of the event-id resolution table
    pub resolver_file: PathBuf,
}

/// Splunk connection settings
#[derive(Clone)]
pub struct SplunkSettings {
    pub host: String,
    pub management_port: u16,
    pub hec_port: u16,
    /// Use https for the HEC endpoint. The management API is always https.
    pub hec_ssl: bool,
    pub ssl_verify: bool,
    pub username: String,
    pub password: String,
    /// Full management base URL, overrides host and port when set
    pub management_url: Option<String>,
    /// Full HEC base URL, overrides host, port and scheme when set
    pub hec_url: Option<String>,
    pub request_timeout_secs: u64,
    pub max_batch_bytes: usize,
    /// Events buffered between the workers and the HEC shipper
    pub queue_capacity: usize,
}

/// Locations of the external conversion tools
#[derive(Debug, Clone)]
pub struct ConverterSettings {
    pub evtx_dump_bin: PathBuf,
    pub fdfind_bin: PathBuf,
}

impl SplunkSettings {
    /// Base URL of the management REST API, without trailing slash
    pub fn management_base_url(&self) -> String {
        match &self.management_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}:{}", self.host, self.management_port),
        }
    }

    /// Base URL of the HTTP Event Collector, without trailing slash
    pub fn hec_base_url(&self) -> String {
        match &self.hec_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let scheme = if self.hec_ssl { "https" } else { "http" };
                format!("{}://{}:{}", scheme, self.host, self.hec_port)
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for SplunkSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplunkSettings")
            .field("management", &self.management_base_url())
            .field("hec", &self.hec_base_url())
            .field("ssl_verify", &self.ssl_verify)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_batch_bytes", &self.max_batch_bytes)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl Default for SplunkSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPLUNK_HOST.to_string(),
            management_port: DEFAULT_MANAGEMENT_PORT,
            hec_port: DEFAULT_HEC_PORT,
            hec_ssl: true,
            ssl_verify: true,
            username: String::new(),
            password: String::new(),
            management_url: None,
            hec_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            evtx_dump_bin: PathBuf::from(DEFAULT_EVTX_DUMP_BIN),
            fdfind_bin: PathBuf::from(DEFAULT_FDFIND_BIN),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            splunk: SplunkSettings::default(),
            converter: ConverterSettings::default(),
            resolver_file: PathBuf::from(DEFAULT_RESOLVER_FILE),
        }
    }
}

impl Settings {
    /// Load settings from `.env` (if present) and the environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = SplunkSettings::default();
        let splunk = SplunkSettings {
            host: std::env::var("SPLUNK_URL").unwrap_or(defaults.host),
            management_port: parse_env("SPLUNK_MPORT")?.unwrap_or(defaults.management_port),
            hec_port: parse_env("SPLUNK_HEC_PORT")?.unwrap_or(defaults.hec_port),
            hec_ssl: parse_env("SPLUNK_SSL")?.unwrap_or(defaults.hec_ssl),
            ssl_verify: parse_env("SPLUNK_SSL_VERIFY")?.unwrap_or(defaults.ssl_verify),
            username: std::env::var("SPLUNK_USER")
                .map_err(|_| E2sError::config("SPLUNK_USER is not set"))?,
            password: std::env::var("SPLUNK_PASS")
                .map_err(|_| E2sError::config("SPLUNK_PASS is not set"))?,
            management_url: std::env::var("SPLUNK_MANAGEMENT_URL").ok(),
            hec_url: std::env::var("SPLUNK_HEC_URL").ok(),
            request_timeout_secs: parse_env("SPLUNK_REQUEST_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout_secs),
            max_batch_bytes: parse_env("HEC_MAX_BATCH_BYTES")?.unwrap_or(defaults.max_batch_bytes),
            queue_capacity: parse_env("HEC_QUEUE_CAPACITY")?.unwrap_or(defaults.queue_capacity),
        };

        let converter = ConverterSettings {
            evtx_dump_bin: std::env::var("EVTX_DUMP_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_EVTX_DUMP_BIN)),
            fdfind_bin: std::env::var("FDFIND_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_FDFIND_BIN)),
        };

        let settings = Settings {
            splunk,
            converter,
            resolver_file: std::env::var("RESOLVER_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_RESOLVER_FILE)),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.splunk.username.is_empty() {
            return Err(E2sError::config("Splunk username cannot be empty"));
        }

        if self.splunk.management_url.is_none() && self.splunk.host.is_empty() {
            return Err(E2sError::config("Splunk host cannot be empty"));
        }

        if self.splunk.request_timeout_secs == 0 {
            return Err(E2sError::config("SPLUNK_REQUEST_TIMEOUT_SECS must be greater than 0"));
        }

        if self.splunk.max_batch_bytes == 0 {
            return Err(E2sError::config("HEC_MAX_BATCH_BYTES must be greater than 0"));
        }

        if self.splunk.queue_capacity == 0 {
            return Err(E2sError::config("HEC_QUEUE_CAPACITY must be greater than 0"));
        }

        if !self.splunk.ssl_verify {
            tracing::warn!("TLS certificate verification is disabled for Splunk connections");
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| E2sError::config(format!("Invalid value for {}: '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}

/// Proxies used for every request to Splunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
}

/// Per-run options, as chosen on the command line
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Target index; created if missing
    pub index: String,
    /// Requested number of workers. Forced to 1 for a single input file.
    pub workers: usize,
    /// Keep the intermediate JSON directory after the run
    pub keep_cache: bool,
    /// Skip conversion and ingest the existing JSON directory
    pub use_cache: bool,
    /// Provision Splunk but do not send any event
    pub testing: bool,
    /// Attach resolved event messages to records
    pub resolve: bool,
    pub proxy: ProxySettings,
    pub show_progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            workers: default_workers(),
            keep_cache: false,
            use_cache: false,
            testing: false,
            resolve: true,
            proxy: ProxySettings::default(),
            show_progress: true,
        }
    }
}

/// Available parallelism of the host, at least 1
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const SPLUNK_VARS: &[&str] = &[
        "SPLUNK_URL",
        "SPLUNK_MPORT",
        "SPLUNK_HEC_PORT",
        "SPLUNK_SSL",
        "SPLUNK_SSL_VERIFY",
        "SPLUNK_USER",
        "SPLUNK_PASS",
        "SPLUNK_MANAGEMENT_URL",
        "SPLUNK_HEC_URL",
        "SPLUNK_REQUEST_TIMEOUT_SECS",
        "HEC_MAX_BATCH_BYTES",
        "HEC_QUEUE_CAPACITY",
        "RESOLVER_FILE",
        "EVTX_DUMP_BIN",
        "FDFIND_BIN",
    ];

    fn clear_env() {
        for var in SPLUNK_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_settings_from_env() {
        clear_env();
        std::env::set_var("SPLUNK_URL", "splunk.corp.local");
        std::env::set_var("SPLUNK_MPORT", "18089");
        std::env::set_var("SPLUNK_SSL", "false");
        std::env::set_var("SPLUNK_USER", "admin");
        std::env::set_var("SPLUNK_PASS", "changeme");
        std::env::set_var("EVTX_DUMP_BIN", "/opt/bin/evtx_dump");

        let settings = Settings::from_env().unwrap();
        assert_eq!(
            settings.splunk.management_base_url(),
            "https://splunk.corp.local:18089"
        );
        assert_eq!(settings.splunk.hec_base_url(), "http://splunk.corp.local:8088");
        assert_eq!(settings.splunk.username, "admin");
        assert_eq!(settings.converter.evtx_dump_bin, PathBuf::from("/opt/bin/evtx_dump"));
        assert_eq!(settings.resolver_file, PathBuf::from(DEFAULT_RESOLVER_FILE));
        assert_eq!(settings.splunk.queue_capacity, DEFAULT_QUEUE_CAPACITY);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_settings_queue_capacity() {
        clear_env();
        std::env::set_var("SPLUNK_USER", "admin");
        std::env::set_var("SPLUNK_PASS", "changeme");
        std::env::set_var("HEC_QUEUE_CAPACITY", "64");

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.splunk.queue_capacity, 64);

        std::env::set_var("HEC_QUEUE_CAPACITY", "0");
        let err = Settings::from_env().unwrap_err();
        assert!(err.to_string().contains("HEC_QUEUE_CAPACITY"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_settings_require_credentials() {
        clear_env();
        std::env::set_var("SPLUNK_PASS", "changeme");

        let err = Settings::from_env().unwrap_err();
        assert!(err.to_string().contains("SPLUNK_USER"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_settings_reject_bad_numbers() {
        clear_env();
        std::env::set_var("SPLUNK_USER", "admin");
        std::env::set_var("SPLUNK_PASS", "changeme");
        std::env::set_var("SPLUNK_MPORT", "not-a-port");

        let err = Settings::from_env().unwrap_err();
        assert!(err.to_string().contains("SPLUNK_MPORT"));

        clear_env();
    }

    #[test]
    fn test_url_overrides_and_redaction() {
        let splunk = SplunkSettings {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
            management_url: Some("http://127.0.0.1:9999/".to_string()),
            hec_url: Some("http://127.0.0.1:9998".to_string()),
            ..SplunkSettings::default()
        };

        assert_eq!(splunk.management_base_url(), "http://127.0.0.1:9999");
        assert_eq!(splunk.hec_base_url(), "http://127.0.0.1:9998");
        assert!(!format!("{:?}", splunk).contains("hunter2"));
    }

    #[test]
    fn test_default_options() {
        let options = IngestOptions::default();
        assert_eq!(options.index, "winevt");
        assert!(options.workers >= 1);
        assert!(options.resolve);
        assert!(!options.testing);
    }
}
