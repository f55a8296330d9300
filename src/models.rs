//! Core data models for the duplicate sweeper

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::hasher::ContentHasher;

/// A file under classification. Size and digest are fetched on first use
/// and cached, so each is computed at most once.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    path: PathBuf,
    size: Option<u64>,
    hash: Option<String>,
}

impl FileCandidate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: None,
            hash: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte size, stat'd on first call
    pub fn size(&mut self) -> Result<u64, ScanError> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let metadata = std::fs::metadata(&self.path)
            .map_err(|e| ScanError::from_io(self.path.clone(), &e))?;
        self.size = Some(metadata.len());
        Ok(metadata.len())
    }

    /// Hex content digest, computed on first call
    pub fn hash(&mut self, hasher: &ContentHasher) -> Result<&str, ScanError> {
        if self.hash.is_none() {
            self.hash = Some(hasher.hash(&self.path)?);
        }
        Ok(self.hash.as_deref().unwrap_or_default())
    }
}

/// The fate of one classified file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Content not seen before; file kept in place
    Accepted,
    /// Exact duplicate of seen content; file deleted
    Removed,
    /// Same size as seen content but different bytes; file relocated
    Moved(PathBuf),
    /// Classification or its action failed; file left alone
    Error(ScanError),
}

impl Outcome {
    /// Lowercase label used in debug logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::Removed => "removed",
            Outcome::Moved(_) => "moved",
            Outcome::Error(_) => "error",
        }
    }
}

/// Result of a sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Duplicates deleted
    pub removed_count: u64,
    /// Bytes freed by deletion
    pub removed_bytes: u64,
    /// Files relocated to the destination
    pub moved_count: u64,
    /// Bytes relocated
    pub moved_bytes: u64,
    /// Files kept as new content
    pub accepted_count: u64,
    /// Directories processed by workers
    pub total_dirs: u64,
    /// Files that matched the extension filter
    pub total_files: u64,
    /// Whether the fingerprint cache was written
    pub cache_written: bool,
    /// Per-file and per-directory failures
    #[serde(skip)]
    pub errors: Vec<ScanError>,
    /// Total run duration in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    /// Create a new empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Check if the run completed without errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Live counters shared by the workers, for progress reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Directories finished so far
    pub done_dirs: u64,
    /// Directories queued for the run
    pub total_dirs: u64,
    /// Files classified so far
    pub classified_files: u64,
    /// Duplicates removed so far
    pub removed: u64,
    /// Files moved so far
    pub moved: u64,
    /// Directory most recently finished
    pub current_dir: String,
    /// Elapsed time in milliseconds
    pub elapsed_ms: u64,
}

impl ScanProgress {
    /// Calculate estimated remaining time from the directory completion rate
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        if self.done_dirs == 0 || self.elapsed_ms == 0 {
            return None;
        }
        let remaining = self.total_dirs.saturating_sub(self.done_dirs);
        Some(remaining.saturating_mul(self.elapsed_ms) / self.done_dirs)
    }
}
