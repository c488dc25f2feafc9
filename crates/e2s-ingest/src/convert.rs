//! EVTX to JSON lines conversion
//!
//! Conversion is delegated to `evtx_dump`. A directory is handled in one `fd`
//! invocation that runs `evtx_dump` on every matching file. Output always lands
//! in a `json_evtx` directory next to (or inside) the input.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::ConverterSettings;
use crate::error::{IngestError, Result};

/// Name of the directory holding converted files
pub const OUTPUT_DIR_NAME: &str = "json_evtx";

/// Pattern handed to `fd` to select EVTX files
pub const EVTX_PATTERN: &str = r".*\.evtx\w*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    File,
    Directory,
}

/// Where an input is read from and converted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPlan {
    pub input: PathBuf,
    pub kind: InputKind,
    pub output_dir: PathBuf,
}

impl InputPlan {
    /// Inspect `input`. It must be an existing file or directory.
    pub fn for_input(input: &Path) -> Result<Self> {
        let (kind, output_dir) = if input.is_file() {
            let parent = input.parent().unwrap_or_else(|| Path::new("."));
            (InputKind::File, parent.join(OUTPUT_DIR_NAME))
        } else if input.is_dir() {
            (InputKind::Directory, input.join(OUTPUT_DIR_NAME))
        } else {
            return Err(IngestError::InvalidInput(input.to_path_buf()));
        };

        Ok(Self {
            input: input.to_path_buf(),
            kind,
            output_dir,
        })
    }
}

/// Wrapper around the `evtx_dump` and `fd` binaries
#[derive(Debug, Clone)]
pub struct EvtxDump {
    evtx_dump_bin: PathBuf,
    fdfind_bin: PathBuf,
}

impl EvtxDump {
    pub fn new(settings: &ConverterSettings) -> Self {
        Self {
            evtx_dump_bin: settings.evtx_dump_bin.clone(),
            fdfind_bin: settings.fdfind_bin.clone(),
        }
    }

    /// Convert the input of `plan` into its output directory.
    ///
    /// Refuses to overwrite an existing converted file.
    pub async fn convert(&self, plan: &InputPlan) -> Result<()> {
        tokio::fs::create_dir_all(&plan.output_dir).await?;

        match plan.kind {
            InputKind::File => self.convert_file(&plan.input, &plan.output_dir).await?,
            InputKind::Directory => self.convert_dir(&plan.input, &plan.output_dir).await?,
        }

        info!(output = %plan.output_dir.display(), "EVTX logs successfully converted");
        Ok(())
    }

    async fn convert_file(&self, input: &Path, output_dir: &Path) -> Result<()> {
        let mut name = input
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| IngestError::InvalidInput(input.to_path_buf()))?;
        name.push(".json");
        let out_file = output_dir.join(name);

        if out_file.exists() {
            return Err(IngestError::conversion(format!(
                "Destination file already exists: {}",
                out_file.display()
            )));
        }

        let mut command = Command::new(&self.evtx_dump_bin);
        command
            .arg(input)
            .args(["-o", "jsonl", "-f"])
            .arg(&out_file)
            .args(["-v", "--no-confirm-overwrite"]);

        self.run(command, &self.evtx_dump_bin).await
    }

    async fn convert_dir(&self, input: &Path, output_dir: &Path) -> Result<()> {
        if let Some(existing) = existing_outputs(input, output_dir).first() {
            return Err(IngestError::conversion(format!(
                "Destination file already exists: {}",
                existing.display()
            )));
        }

        let mut command = Command::new(&self.fdfind_bin);
        command
            .arg(EVTX_PATTERN)
            .arg(input)
            .arg("-x")
            .arg(&self.evtx_dump_bin)
            .args(["-o", "jsonl", "{}", "-f"])
            .arg(output_dir.join("{/.}.json"));

        self.run(command, &self.fdfind_bin).await
    }

    async fn run(&self, mut command: Command, program: &Path) -> Result<()> {
        debug!(command = ?command, "Running converter");

        let output = command.output().await.map_err(|e| {
            IngestError::conversion(format!("Unable to run {}: {}", program.display(), e))
        })?;

        if !output.status.success() {
            error!(status = %output.status, "Something went wrong converting the EVTX files");
            warn!(stderr = %String::from_utf8_lossy(&output.stderr), "Converter stderr");
            warn!(stdout = %String::from_utf8_lossy(&output.stdout), "Converter stdout");
            return Err(IngestError::conversion(format!(
                "{} exited with {}",
                program.display(),
                output.status
            )));
        }

        Ok(())
    }
}

/// Converted files that would be overwritten by converting `input`
fn existing_outputs(input: &Path, output_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(input)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.path() != output_dir)
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().contains(".evtx"))
        .filter_map(|entry| {
            let stem = entry.path().file_stem()?.to_owned();
            let mut name = stem;
            name.push(".json");
            let candidate = output_dir.join(name);
            candidate.exists().then_some(candidate)
        })
        .collect()
}
