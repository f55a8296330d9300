//! Scanner module - parallel sweep orchestration
//!
//! A run has two phases: the walker flattens every base path into a set of
//! directories, then a fixed-size rayon pool processes one directory per
//! task. Files inside a directory are classified sequentially. The index is
//! persisted only after every task has returned.

use rayon::prelude::*;
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::audit::AuditLog;
use crate::classifier::Classifier;
use crate::config::ScanConfig;
use crate::error::{ScanError, ScanErrorKind};
use crate::index::FingerprintIndex;
use crate::models::{Outcome, RunSummary, ScanProgress};
use crate::progress::{ProgressReporter, ScanPhase};
use crate::walker::DirectoryWalker;

/// Minimum interval between progress lines
const PROGRESS_INTERVAL_MS: u64 = 500;

/// Per-run tallies shared by the workers
#[derive(Debug, Default)]
struct SweepStats {
    done_dirs: AtomicU64,
    files: AtomicU64,
    accepted: AtomicU64,
    errors: Mutex<Vec<ScanError>>,
}

impl SweepStats {
    fn push_error(&self, error: ScanError) {
        match self.errors.lock() {
            Ok(mut errors) => errors.push(error),
            Err(poisoned) => poisoned.into_inner().push(error),
        }
    }

    fn take_errors(self) -> Vec<ScanError> {
        self.errors
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Run a full sweep: open the index (from cache if readable), process every
/// directory, persist the index, and summarize.
pub fn run(config: &ScanConfig) -> RunSummary {
    let index = FingerprintIndex::open(config);
    run_with_index(config, &index)
}

/// Run a sweep against a caller-supplied index
pub fn run_with_index(config: &ScanConfig, index: &FingerprintIndex) -> RunSummary {
    let start = Instant::now();
    let reporter = ProgressReporter::new(config.show_progress, PROGRESS_INTERVAL_MS);
    reporter.report_start(config);

    prepare_destination(config);
    let audit = AuditLog::open_or_disabled(&config.log_dir());

    let walker = DirectoryWalker::new(config.dest_path.as_deref());
    let (dirs, walk_errors) = walker.enumerate_all(&config.base_paths).into_parts();
    for error in &walk_errors {
        reporter.report_error(error);
    }
    let total_dirs = dirs.len() as u64;
    reporter.report_phase(
        ScanPhase::Walk,
        &ScanProgress {
            total_dirs,
            elapsed_ms: start.elapsed().as_millis() as u64,
            ..ScanProgress::default()
        },
    );

    let threads = config.effective_threads();
    log::info!(
        "Scanning {} directories with {} worker threads",
        dirs.len(),
        threads
    );

    let stats = fan_out(&dirs, config, index, &audit, &reporter, start);

    // Every worker has returned; only now is the index complete.
    let cache_written = index.persist(config);

    let accepted_count = stats.accepted.load(Ordering::Relaxed);
    let total_files = stats.files.load(Ordering::Relaxed);
    let mut errors = walk_errors;
    errors.extend(stats.take_errors());

    let summary = RunSummary {
        removed_count: index.removed_count(),
        removed_bytes: index.removed_bytes(),
        moved_count: index.moved_count(),
        moved_bytes: index.moved_bytes(),
        accepted_count,
        total_dirs,
        total_files,
        cache_written,
        errors,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    log::info!(
        "Removed {} files, freed {} bytes; moved {} files ({} bytes); {} errors",
        summary.removed_count,
        summary.removed_bytes,
        summary.moved_count,
        summary.moved_bytes,
        summary.error_count()
    );
    reporter.report_done(&summary);
    summary
}

/// Classify every queued directory on a pool of `config.effective_threads()`
/// workers and return once all of them have finished
fn fan_out(
    dirs: &[PathBuf],
    config: &ScanConfig,
    index: &FingerprintIndex,
    audit: &AuditLog,
    reporter: &ProgressReporter,
    start: Instant,
) -> SweepStats {
    let stats = SweepStats::default();
    let classifier = Classifier::new(config, index, audit);
    let total_dirs = dirs.len() as u64;

    let work = || {
        dirs.par_iter().for_each(|dir| {
            process_directory(dir, config, &classifier, &stats, reporter);

            let done = stats.done_dirs.fetch_add(1, Ordering::Relaxed) + 1;
            reporter.report_progress(&ScanProgress {
                done_dirs: done,
                total_dirs,
                classified_files: stats.files.load(Ordering::Relaxed),
                removed: index.removed_count(),
                moved: index.moved_count(),
                current_dir: dir.to_string_lossy().to_string(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        })
    };

    match rayon::ThreadPoolBuilder::new()
        .num_threads(config.effective_threads())
        .build()
    {
        Ok(pool) => pool.install(work),
        Err(e) => {
            log::warn!("Could not build worker pool ({}), using the global pool", e);
            work();
        }
    }
    stats
}

/// Make sure the move destination exists before any worker needs it
fn prepare_destination(config: &ScanConfig) {
    if let Some(dest) = &config.dest_path {
        if let Err(e) = fs::create_dir_all(dest) {
            log::error!(
                "Cannot create destination {}: {}; moves will fail",
                dest.display(),
                e
            );
        }
    }
}

/// Classify the matching files directly inside `dir`. A panic is caught and
/// recorded so it cannot take the other directories down with it.
fn process_directory(
    dir: &Path,
    config: &ScanConfig,
    classifier: &Classifier<'_>,
    stats: &SweepStats,
    reporter: &ProgressReporter,
) {
    let record = |error: ScanError| {
        reporter.report_error(&error);
        stats.push_error(error);
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        for path in list_candidates(dir, config, &record)? {
            stats.files.fetch_add(1, Ordering::Relaxed);
            let outcome = classifier.classify(&path, config.move_enabled());
            log::debug!("{}: {}", path.display(), outcome.as_str());
            match outcome {
                Outcome::Accepted => {
                    stats.accepted.fetch_add(1, Ordering::Relaxed);
                }
                Outcome::Removed | Outcome::Moved(_) => {}
                Outcome::Error(e) => record(e),
            }
        }
        Ok::<(), ScanError>(())
    }));

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            log::warn!("Skipping directory {}: {}", dir.display(), e);
            record(e);
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("Worker panicked in {}: {}", dir.display(), message);
            record(ScanError::new(
                ScanErrorKind::WorkerPanic,
                Some(dir.to_path_buf()),
                message,
            ));
        }
    }
}

/// Regular files directly inside `dir` whose extension is accepted, sorted
/// by path so the first copy in a directory is the one kept. Symbolic links
/// are not followed.
fn list_candidates(
    dir: &Path,
    config: &ScanConfig,
    record: &dyn Fn(ScanError),
) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ScanError::directory_access(dir.to_path_buf(), e.to_string()))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Unreadable entry in {}: {}", dir.display(), e);
                record(ScanError::from_io(dir.to_path_buf(), &e));
                continue;
            }
        };
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let path = entry.path();
        if config.extensions.matches(&path) {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_list_candidates_filters_and_skips_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("B.TXT"), "b").unwrap();
        fs::write(dir.path().join("c.jpg"), "c").unwrap();
        fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let config = ScanConfig::builder().extensions(["txt"]).build();
        let found = list_candidates(dir.path(), &config, &|_| {}).unwrap();

        assert_eq!(
            found,
            vec![dir.path().join("B.TXT"), dir.path().join("a.txt")]
        );
    }

    #[test]
    fn test_list_candidates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::default();
        let err = list_candidates(&dir.path().join("gone"), &config, &|_| {}).unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::DirectoryAccess);
    }

    #[test]
    fn test_vanished_directory_does_not_stop_the_others() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().join("base");
        let work = root.path().join("work");
        let mut dirs = Vec::new();
        for (i, name) in ["one", "gone", "two"].iter().enumerate() {
            let dir = base.join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("f.txt"), "x".repeat(i + 1)).unwrap();
            dirs.push(dir);
        }
        // Queued by the walk, deleted before its worker runs
        fs::remove_dir_all(&dirs[1]).unwrap();

        let config = ScanConfig::builder()
            .add_base_path(&base)
            .extensions(["txt"])
            .work_dir(&work)
            .cache_writable(true)
            .num_threads(3)
            .build();
        let index = FingerprintIndex::new();
        let audit = AuditLog::disabled();
        let reporter = ProgressReporter::new(false, 0);

        let stats = fan_out(&dirs, &config, &index, &audit, &reporter, Instant::now());

        assert_eq!(stats.done_dirs.load(Ordering::Relaxed), 3);
        assert_eq!(stats.files.load(Ordering::Relaxed), 2);
        assert_eq!(stats.accepted.load(Ordering::Relaxed), 2);
        assert!(index.size_seen(1));
        assert!(index.size_seen(3));
        assert!(index.persist(&config));

        let errors = stats.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ScanErrorKind::DirectoryAccess);
        assert_eq!(errors[0].path.as_deref(), Some(dirs[1].as_path()));
    }

    #[test]
    fn test_stats_collect_errors_from_many_threads() {
        let stats = SweepStats::default();
        (0..100u32).into_par_iter().for_each(|i| {
            stats.push_error(ScanError::new(ScanErrorKind::IoError, None, i.to_string()));
        });
        assert_eq!(stats.take_errors().len(), 100);
    }
}
