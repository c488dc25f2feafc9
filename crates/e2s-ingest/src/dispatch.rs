//! File discovery and size-balanced work assignment

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Result;

/// Extension of the files produced by the converter
pub const CONVERTED_EXTENSION: &str = "json";

/// A converted file and its size on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Files assigned to one worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchList {
    pub files: Vec<PathBuf>,
    /// Sum of the sizes of `files`
    pub size: u64,
}

impl DispatchList {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// List every `*.json` file under `dir` in file-name-sorted walk order
pub fn discover_files(dir: &Path) -> Result<Vec<DiscoveredFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            std::io::Error::other(format!("Failed to list {}: {}", dir.display(), e))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let is_converted = entry
            .path()
            .extension()
            .is_some_and(|ext| ext == CONVERTED_EXTENSION);
        if !is_converted {
            continue;
        }

        let size = entry.metadata().map_err(std::io::Error::other)?.len();
        files.push(DiscoveredFile {
            path: entry.into_path(),
            size,
        });
    }

    debug!(dir = %dir.display(), count = files.len(), "Discovered converted files");
    Ok(files)
}

/// Split `files` into `workers` lists of roughly equal total size.
///
/// Each file goes to the list with the smallest running total, ties going to
/// the lowest index. `workers == 0` is treated as 1. Lists may stay empty when
/// there are fewer files than workers.
pub fn dispatch_by_size(files: Vec<DiscoveredFile>, workers: usize) -> Vec<DispatchList> {
    let workers = workers.max(1);
    let mut lists = vec![DispatchList::default(); workers];

    for file in files {
        let index = lists
            .iter()
            .enumerate()
            .min_by_key(|(index, list)| (list.size, *index))
            .map_or(0, |(index, _)| index);

        let list = &mut lists[index];
        list.size += file.size;
        list.files.push(file.path);
    }

    info!(
        workers,
        sizes = ?lists.iter().map(|l| l.size).collect::<Vec<_>>(),
        "Dispatched files across workers"
    );

    lists
}
