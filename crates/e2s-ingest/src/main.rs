//! evtx2splunk - ingest Windows EVTX logs into Splunk

use anyhow::{Context, Result};
use clap::Parser;
use e2s_common::logging::{init_logging, LogConfig, LogLevel};
use e2s_ingest::config::{default_workers, IngestOptions, ProxySettings, Settings, DEFAULT_INDEX};
use e2s_ingest::IngestPipeline;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "evtx2splunk")]
#[command(author, version, about = "Ingest EVTX files into Splunk")]
struct Cli {
    /// EVTX file or directory of EVTX files
    #[arg(long)]
    input: PathBuf,

    /// Number of ingestion workers. Defaults to the number of CPUs.
    #[arg(long = "nb-process")]
    nb_process: Option<usize>,

    /// Splunk index to push the events to
    #[arg(long, default_value = DEFAULT_INDEX)]
    index: String,

    /// Keep the converted JSON files after ingestion
    #[arg(long)]
    keep_cache: bool,

    /// Skip conversion and ingest previously converted files
    #[arg(long)]
    use_cache: bool,

    /// Testing mode: the index and HEC token are created but no event is sent
    #[arg(long)]
    test: bool,

    /// Do not resolve event ids to their messages
    #[arg(long)]
    no_resolve: bool,

    /// HTTP proxy for Splunk requests
    #[arg(long)]
    proxy_http: Option<String>,

    /// HTTPS proxy for Splunk requests
    #[arg(long)]
    proxy_https: Option<String>,

    /// Do not display progress bars
    #[arg(long)]
    no_progress: bool,

    /// Log level: trace, debug, info, warn, error or critical
    #[arg(short = 'v', long)]
    verbosity: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::builder()
        .log_file_prefix("evtx2splunk")
        .build()
        .merge_env()?;
    if let Some(level) = &cli.verbosity {
        log_config.level = level.parse::<LogLevel>()?;
    }
    init_logging(&log_config)?;

    let settings = Settings::from_env().context("Invalid Splunk configuration")?;

    let options = IngestOptions {
        index: cli.index,
        workers: cli.nb_process.unwrap_or_else(default_workers),
        keep_cache: cli.keep_cache,
        use_cache: cli.use_cache,
        testing: cli.test,
        resolve: !cli.no_resolve,
        proxy: ProxySettings {
            http: cli.proxy_http,
            https: cli.proxy_https,
        },
        show_progress: !cli.no_progress,
    };

    info!(input = %cli.input.display(), index = %options.index, "Starting evtx2splunk");
    let summary = IngestPipeline::new(settings, options)
        .run(&cli.input)
        .await
        .with_context(|| format!("Ingestion of {} failed", cli.input.display()))?;

    info!(
        files = summary.files_succeeded,
        failed = summary.files_failed(),
        events_sent = summary.delivery.events_sent,
        events_failed = summary.delivery.events_failed,
        "Done"
    );
    Ok(())
}
