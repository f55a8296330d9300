//! JSON-lines progress on stderr
//!
//! Every line is one [`ProgressEvent`] wrapped with a sequence number and a
//! millisecond offset from the start of the run. The `_t` tag names the
//! event: `start`, `p`, `err` or `done`.

use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::models::{RunSummary, ScanProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    /// Directory enumeration finished
    Walk,
    /// Workers are classifying files
    Classify,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_t")]
pub enum ProgressEvent {
    #[serde(rename = "start")]
    Start {
        roots: Vec<String>,
        move_enabled: bool,
        cache_readable: bool,
        threads: usize,
    },
    #[serde(rename = "p")]
    Progress {
        phase: ScanPhase,
        #[serde(rename = "d")]
        done_dirs: u64,
        #[serde(rename = "td")]
        total_dirs: u64,
        #[serde(rename = "f")]
        files: u64,
        #[serde(rename = "r")]
        removed: u64,
        #[serde(rename = "m")]
        moved: u64,
        dir: String,
        ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        eta_ms: Option<u64>,
    },
    #[serde(rename = "err")]
    Error {
        kind: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    #[serde(rename = "done")]
    Done {
        #[serde(rename = "rc")]
        removed_count: u64,
        #[serde(rename = "rb")]
        removed_bytes: u64,
        #[serde(rename = "mc")]
        moved_count: u64,
        #[serde(rename = "mb")]
        moved_bytes: u64,
        #[serde(rename = "ac")]
        accepted_count: u64,
        #[serde(rename = "ec")]
        error_count: usize,
        ms: u64,
    },
}

impl ProgressEvent {
    pub fn start(config: &ScanConfig) -> Self {
        ProgressEvent::Start {
            roots: config
                .base_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            move_enabled: config.move_enabled(),
            cache_readable: config.cache_readable,
            threads: config.effective_threads(),
        }
    }

    pub fn progress(phase: ScanPhase, progress: &ScanProgress) -> Self {
        ProgressEvent::Progress {
            phase,
            done_dirs: progress.done_dirs,
            total_dirs: progress.total_dirs,
            files: progress.classified_files,
            removed: progress.removed,
            moved: progress.moved,
            dir: progress.current_dir.clone(),
            ms: progress.elapsed_ms,
            eta_ms: progress.estimated_remaining_ms(),
        }
    }

    pub fn error(error: &ScanError) -> Self {
        ProgressEvent::Error {
            kind: format!("{:?}", error.kind),
            message: error.message.clone(),
            path: error.path.as_ref().map(|p| p.display().to_string()),
        }
    }

    pub fn done(summary: &RunSummary) -> Self {
        ProgressEvent::Done {
            removed_count: summary.removed_count,
            removed_bytes: summary.removed_bytes,
            moved_count: summary.moved_count,
            moved_bytes: summary.moved_bytes,
            accepted_count: summary.accepted_count,
            error_count: summary.error_count(),
            ms: summary.duration_ms,
        }
    }
}

/// One output line
#[derive(Debug, Serialize)]
struct Line<'a> {
    seq: u64,
    ts: u64,
    #[serde(flatten)]
    event: &'a ProgressEvent,
}

/// Writes progress events for a run. Shared by reference across workers.
pub struct ProgressReporter {
    enabled: bool,
    interval_ms: u64,
    last_report: Mutex<Instant>,
    seq: AtomicU64,
    started: Instant,
}

impl ProgressReporter {
    /// `interval_ms` throttles `p` lines from workers; other events are
    /// always written.
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            interval_ms,
            last_report: Mutex::new(now),
            seq: AtomicU64::new(0),
            started: now,
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Serialize `event` as it would be written, consuming a sequence number
    fn render(&self, event: &ProgressEvent) -> Option<String> {
        let line = Line {
            seq: self.next_seq(),
            ts: self.started.elapsed().as_millis() as u64,
            event,
        };
        serde_json::to_string(&line).ok()
    }

    /// Write `event` unconditionally (when enabled)
    pub fn emit(&self, event: &ProgressEvent) {
        if !self.enabled {
            return;
        }
        if let Some(json) = self.render(event) {
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "{}", json).ok();
            stderr.flush().ok();
        }
    }

    fn try_claim_slot(&self) -> bool {
        if !self.enabled {
            return false;
        }
        // Someone else holds the slot
        let Ok(mut last) = self.last_report.try_lock() else {
            return false;
        };
        if (last.elapsed().as_millis() as u64) < self.interval_ms {
            return false;
        }
        *last = Instant::now();
        true
    }

    pub fn report_start(&self, config: &ScanConfig) {
        if self.enabled {
            self.emit(&ProgressEvent::start(config));
        }
    }

    /// Unthrottled progress line marking a phase boundary
    pub fn report_phase(&self, phase: ScanPhase, progress: &ScanProgress) {
        if self.enabled {
            self.emit(&ProgressEvent::progress(phase, progress));
        }
    }

    /// Throttled classify progress; true when a line was written
    pub fn report_progress(&self, progress: &ScanProgress) -> bool {
        if !self.try_claim_slot() {
            return false;
        }
        self.emit(&ProgressEvent::progress(ScanPhase::Classify, progress));
        true
    }

    pub fn report_error(&self, error: &ScanError) {
        if self.enabled {
            self.emit(&ProgressEvent::error(error));
        }
    }

    pub fn report_done(&self, summary: &RunSummary) {
        if self.enabled {
            self.emit(&ProgressEvent::done(summary));
        }
    }
}
