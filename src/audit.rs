//! Append-only audit trail of classification decisions
//!
//! Three plain-text logs under the work directory's `logs/`: `new.log`,
//! `removed.log` and `moved.log`. One timestamped line per event.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub const NEW_LOG: &str = "new.log";
pub const REMOVED_LOG: &str = "removed.log";
pub const MOVED_LOG: &str = "moved.log";

/// Per-outcome append-only logs shared by all workers
#[derive(Debug, Default)]
pub struct AuditLog {
    new: Option<Mutex<File>>,
    removed: Option<Mutex<File>>,
    moved: Option<Mutex<File>>,
}

impl AuditLog {
    /// Open (or create) the three logs in `dir`
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        let open = |name: &str| -> std::io::Result<Option<Mutex<File>>> {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))?;
            Ok(Some(Mutex::new(file)))
        };
        Ok(Self {
            new: open(NEW_LOG)?,
            removed: open(REMOVED_LOG)?,
            moved: open(MOVED_LOG)?,
        })
    }

    /// Open the logs, falling back to a no-op trail with a warning
    pub fn open_or_disabled(dir: &Path) -> Self {
        match Self::open(dir) {
            Ok(log) => log,
            Err(e) => {
                log::warn!(
                    "Audit logs unavailable in {}, continuing without them: {}",
                    dir.display(),
                    e
                );
                Self::disabled()
            }
        }
    }

    /// A trail that records nothing
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn record_new(&self, path: &Path, size: u64) {
        append(
            &self.new,
            format_args!("New file {} detected ({} bytes)", path.display(), size),
        );
    }

    pub fn record_removed(&self, path: &Path, size: u64) {
        append(
            &self.removed,
            format_args!(
                "Remove {} due to duplication. Free {} bytes",
                path.display(),
                size
            ),
        );
    }

    pub fn record_moved(&self, from: &Path, to: &Path, size: u64) {
        append(
            &self.moved,
            format_args!("Move {} to {} ({} bytes)", from.display(), to.display(), size),
        );
    }
}

fn append(target: &Option<Mutex<File>>, line: std::fmt::Arguments<'_>) {
    let Some(file) = target else {
        return;
    };
    let stamp = Local::now().to_rfc3339();
    let mut file = match file.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Err(e) = writeln!(file, "{} {}", stamp, line) {
        log::warn!("Failed to append audit line: {}", e);
    }
}
