//! Directory enumeration
//!
//! Builds the flat set of directories that the worker pool fans out over.
//! Symbolic links are never followed, so link cycles cannot trap the walk.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{ScanError, ScanErrorKind};

/// Directories found under one or more base paths, plus the subtrees that
/// had to be skipped
#[derive(Debug, Default)]
pub struct DirectoryQueue {
    dirs: HashSet<PathBuf>,
    errors: Vec<ScanError>,
}

impl DirectoryQueue {
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains(dir)
    }

    pub fn errors(&self) -> &[ScanError] {
        &self.errors
    }

    /// Consume the queue into its directories, in no particular order
    pub fn into_parts(self) -> (Vec<PathBuf>, Vec<ScanError>) {
        (self.dirs.into_iter().collect(), self.errors)
    }
}

/// Recursively enumerates directories, pruning the destination subtree
#[derive(Debug, Clone, Default)]
pub struct DirectoryWalker {
    excluded: Option<PathBuf>,
}

impl DirectoryWalker {
    /// Create a walker that never yields `excluded` or anything below it
    pub fn new(excluded: Option<&Path>) -> Self {
        Self {
            excluded: excluded.map(canonical_or_owned),
        }
    }

    /// Enumerate every base path and union the results
    pub fn enumerate_all(&self, bases: &[PathBuf]) -> DirectoryQueue {
        let mut queue = DirectoryQueue::default();
        for base in bases {
            let found = self.enumerate(base);
            queue.dirs.extend(found.dirs);
            queue.errors.extend(found.errors);
        }
        log::info!(
            "Found {} directories under {} base path(s)",
            queue.len(),
            bases.len()
        );
        queue
    }

    /// Enumerate `base` and all directories beneath it
    pub fn enumerate(&self, base: &Path) -> DirectoryQueue {
        let mut queue = DirectoryQueue::default();
        self.walk_into(base, &mut queue);
        queue
    }

    fn walk_into(&self, base: &Path, queue: &mut DirectoryQueue) {
        let base = match base.canonicalize() {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Skipping base path {}: {}", base.display(), e);
                queue.errors.push(ScanError::from_io(base.to_path_buf(), &e));
                return;
            }
        };
        if !base.is_dir() {
            log::warn!("Skipping base path {}: not a directory", base.display());
            queue.errors.push(ScanError::directory_access(
                base,
                "base path is not a directory",
            ));
            return;
        }

        let walker = WalkDir::new(&base)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.file_type().is_dir() && !self.is_excluded(entry.path()));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    queue.dirs.insert(entry.into_path());
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf());
                    // walkdir yields a directory before reading it; drop it
                    // again when that read fails
                    if let Some(unreadable) = &path {
                        queue.dirs.remove(unreadable);
                    }
                    let denied = e.io_error().map(|io| io.kind()) == Some(ErrorKind::PermissionDenied);
                    let kind = if denied {
                        ScanErrorKind::PermissionDenied
                    } else {
                        ScanErrorKind::DirectoryAccess
                    };
                    log::warn!("Skipping subtree: {}", e);
                    queue.errors.push(ScanError::new(kind, path, e.to_string()));
                }
            }
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        match &self.excluded {
            Some(excluded) => path.starts_with(excluded),
            None => false,
        }
    }
}

/// Resolve a path for prefix comparison; a destination that does not exist
/// yet is compared as given.
fn canonical_or_owned(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
