//! Duplicate file sweeper with parallel directory traversal
//!
//! Finds duplicate files by a two-stage fingerprint (byte size, then MD5
//! content digest) across one or more base directories, deletes exact
//! duplicates and optionally relocates same-size files. The fingerprint
//! index persists between runs so a later sweep recognizes content it has
//! already seen.

pub mod actions;
pub mod audit;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod hasher;
pub mod index;
pub mod models;
pub mod progress;
pub mod scanner;
pub mod walker;

pub use audit::AuditLog;
pub use cache::{CacheSnapshot, CacheStore};
pub use classifier::Classifier;
pub use config::{ConfigDocument, ExtensionFilter, ScanConfig};
pub use error::{CacheError, ConfigError, ScanError, ScanErrorKind};
pub use hasher::ContentHasher;
pub use index::FingerprintIndex;
pub use models::{FileCandidate, Outcome, RunSummary, ScanProgress};
pub use progress::{ProgressEvent, ProgressReporter, ScanPhase};
pub use scanner::{run, run_with_index};
pub use walker::{DirectoryQueue, DirectoryWalker};
