//! File actions taken on classified files: deletion and relocation.
//!
//! Both actions retry once after clearing a read-only attribute when the
//! filesystem refuses them. A relocation never overwrites: if the
//! destination already holds the name, the file gets the first free
//! ` (N)` suffix before its extension.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::error::ScanError;

/// Highest ` (N)` suffix tried before a move gives up
const MAX_NAME_SUFFIX: u32 = 9999;

/// Delete `path`, clearing a read-only attribute once if needed
pub fn remove_file(path: &Path) -> Result<(), ScanError> {
    with_readonly_retry(path, || fs::remove_file(path))
        .map_err(|e| ScanError::action_failed(path.to_path_buf(), format!("delete failed: {}", e)))
}

/// Move `path` into `dest_dir` keeping its base name, and return where it
/// landed
pub fn move_into(path: &Path, dest_dir: &Path) -> Result<PathBuf, ScanError> {
    let file_name = path.file_name().ok_or_else(|| {
        ScanError::action_failed(path.to_path_buf(), "path has no file name")
    })?;
    let target = reserve_target(dest_dir, file_name).map_err(|e| {
        ScanError::action_failed(
            path.to_path_buf(),
            format!("cannot reserve name in {}: {}", dest_dir.display(), e),
        )
    })?;

    match relocate(path, &target) {
        Ok(()) => Ok(target),
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&target) {
                log::warn!(
                    "Could not remove placeholder {}: {}",
                    target.display(),
                    cleanup
                );
            }
            Err(ScanError::action_failed(
                path.to_path_buf(),
                format!("move to {} failed: {}", target.display(), e),
            ))
        }
    }
}

/// Rename over the reserved placeholder, falling back to copy + delete
/// when the destination is on another filesystem
fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match with_readonly_retry(from, || fs::rename(from, to)) {
        Ok(()) => Ok(()),
        Err(e) if matches!(e.kind(), ErrorKind::PermissionDenied | ErrorKind::NotFound) => Err(e),
        Err(e) => {
            log::debug!(
                "Rename {} failed ({}), copying instead",
                from.display(),
                e
            );
            fs::copy(from, to)?;
            with_readonly_retry(from, || fs::remove_file(from))
        }
    }
}

/// Atomically claim the first free name in `dest_dir`
fn reserve_target(dest_dir: &Path, file_name: &std::ffi::OsStr) -> io::Result<PathBuf> {
    for attempt in 0..=MAX_NAME_SUFFIX {
        let candidate = dest_dir.join(suffixed_name(file_name, attempt));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free name for {:?}", file_name),
    ))
}

/// `photo.jpg` → `photo (2).jpg`; attempt 0 keeps the name unchanged
fn suffixed_name(file_name: &std::ffi::OsStr, attempt: u32) -> OsString {
    if attempt == 0 {
        return file_name.to_os_string();
    }
    let path = Path::new(file_name);
    let stem = path.file_stem().unwrap_or(file_name);
    let mut name = stem.to_os_string();
    name.push(format!(" ({})", attempt));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

fn with_readonly_retry<T>(path: &Path, op: impl Fn() -> io::Result<T>) -> io::Result<T> {
    match op() {
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            if clear_readonly(path) {
                log::info!("Cleared read-only attribute on {}, retrying", path.display());
                op()
            } else {
                Err(e)
            }
        }
        other => other,
    }
}

/// Returns true if the attribute was set and has been cleared
#[allow(clippy::permissions_set_readonly_false)]
fn clear_readonly(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    let mut permissions = metadata.permissions();
    if !permissions.readonly() {
        return false;
    }
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions).is_ok()
}
