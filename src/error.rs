//! Error types for the duplicate sweeper

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    PermissionDenied,
    NotFound,
    /// Any other I/O failure
    IoError,
    /// Reading a file for its digest failed part-way
    HashError,
    /// A directory could not be listed or is not a directory
    DirectoryAccess,
    /// Deleting or moving a duplicate failed
    ActionFailed,
    /// A worker panicked while processing a directory
    WorkerPanic,
}

impl From<io::ErrorKind> for ScanErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::PermissionDenied => ScanErrorKind::PermissionDenied,
            io::ErrorKind::NotFound => ScanErrorKind::NotFound,
            _ => ScanErrorKind::IoError,
        }
    }
}

/// A per-file or per-directory failure. Recorded in the run summary, never
/// fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} [{}]: {message}", display_path(.path))]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub path: Option<PathBuf>,
    pub message: String,
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_deref()
        .map(Path::display)
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl ScanError {
    pub fn new(kind: ScanErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    pub fn not_found(path: PathBuf) -> Self {
        Self::new(ScanErrorKind::NotFound, Some(path), "no such file or directory")
    }

    /// Wrap an I/O failure on `path`, keeping permission and not-found
    /// distinct from other failures
    pub fn from_io(path: PathBuf, err: &io::Error) -> Self {
        Self::new(err.kind().into(), Some(path), err.to_string())
    }

    pub fn hash_error(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::HashError, Some(path), message)
    }

    pub fn directory_access(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::DirectoryAccess, Some(path), message)
    }

    pub fn action_failed(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::ActionFailed, Some(path), message)
    }
}

impl From<io::Error> for ScanError {
    fn from(err: io::Error) -> Self {
        Self::new(err.kind().into(), None, err.to_string())
    }
}

/// Setup failures. The only errors that abort a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be read
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration document is not valid JSON for the expected shape
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document parsed but a value is unusable
    #[error("invalid config: {0}")]
    Invalid(String),

    /// The configuration document could not be written
    #[error("cannot write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fingerprint cache failures. Always absorbed with a log line.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {path} unreadable: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache file {path} not writable: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
