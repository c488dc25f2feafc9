//! Progress bars for the worker pool
//!
//! One bar per worker, counting files. Bars are hidden when progress display is
//! turned off so workers can drive them unconditionally.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Bars for every worker of a run
#[derive(Debug, Clone)]
pub struct WorkerProgress {
    multi: MultiProgress,
}

impl WorkerProgress {
    pub fn new(visible: bool) -> Self {
        let multi = if visible {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self { multi }
    }

    /// Bar for one worker over `files` files
    pub fn worker_bar(&self, worker: usize, files: u64) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(files));
        pb.set_style(worker_style());
        pb.set_prefix(format!("worker {:>2}", worker));
        pb
    }
}

fn worker_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
