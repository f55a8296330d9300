//! Two-stage duplicate classification
//!
//! A file whose size has never been seen is new. Otherwise its content
//! digest decides: a known digest is a duplicate and is deleted, an unknown
//! one is a same-size file that may be moved aside. The digest is computed
//! once per file.

use std::path::Path;

use crate::actions;
use crate::audit::AuditLog;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::hasher::ContentHasher;
use crate::index::FingerprintIndex;
use crate::models::{FileCandidate, Outcome};

/// Decides the fate of each file against the shared index
pub struct Classifier<'a> {
    index: &'a FingerprintIndex,
    audit: &'a AuditLog,
    hasher: ContentHasher,
    dest_dir: Option<&'a Path>,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a ScanConfig, index: &'a FingerprintIndex, audit: &'a AuditLog) -> Self {
        Self {
            index,
            audit,
            hasher: ContentHasher::new(config.buff_size),
            dest_dir: config.dest_path.as_deref(),
        }
    }

    /// Classify one file and carry out the resulting action.
    ///
    /// Failures are logged and returned as [`Outcome::Error`]; they never
    /// propagate further.
    pub fn classify(&self, path: &Path, move_enabled: bool) -> Outcome {
        let mut candidate = FileCandidate::new(path);
        match self.decide(&mut candidate, move_enabled) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                Outcome::Error(e)
            }
        }
    }

    fn decide(&self, candidate: &mut FileCandidate, move_enabled: bool) -> Result<Outcome, ScanError> {
        let size = candidate.size()?;
        let digest = candidate.hash(&self.hasher)?.to_string();
        let path = candidate.path();

        // Each mark is a single insert, so of two identical files racing on
        // different workers exactly one sees its digest as new.
        let new_digest = self.index.mark_hash(&digest);
        let new_size = self.index.mark_size(size);

        if !new_digest {
            actions::remove_file(path)?;
            self.index.add_removed(size, 1);
            log::info!(
                "Remove {} due to duplication. Free {} bytes",
                path.display(),
                size
            );
            self.audit.record_removed(path, size);
            return Ok(Outcome::Removed);
        }

        if new_size {
            log::debug!("New file {} detected", path.display());
            self.audit.record_new(path, size);
            return Ok(Outcome::Accepted);
        }

        // Same size, different content
        match self.dest_dir.filter(|_| move_enabled) {
            Some(dest) => {
                let target = actions::move_into(path, dest)?;
                self.index.add_moved(size, 1);
                log::info!("Moved {} to {}", path.display(), target.display());
                self.audit.record_moved(path, &target, size);
                Ok(Outcome::Moved(target))
            }
            None => {
                log::debug!("New file {} detected (size collision)", path.display());
                self.audit.record_new(path, size);
                Ok(Outcome::Accepted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanErrorKind;
    use std::fs;
    use std::path::PathBuf;

    struct Fixture {
        dir: tempfile::TempDir,
        config: ScanConfig,
        index: FingerprintIndex,
        audit: AuditLog,
    }

    impl Fixture {
        fn new(with_dest: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut builder = ScanConfig::builder()
                .add_base_path(dir.path().join("in"))
                .work_dir(dir.path())
                .buff_size(4);
            fs::create_dir(dir.path().join("in")).unwrap();
            if with_dest {
                fs::create_dir(dir.path().join("out")).unwrap();
                builder = builder.dest_path(dir.path().join("out"));
            }
            Self {
                config: builder.build(),
                index: FingerprintIndex::new(),
                audit: AuditLog::disabled(),
                dir,
            }
        }

        fn file(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join("in").join(name);
            fs::write(&path, content).unwrap();
            path
        }

        fn classifier(&self) -> Classifier<'_> {
            Classifier::new(&self.config, &self.index, &self.audit)
        }
    }

    #[test]
    fn test_unique_file_is_accepted_and_marked() {
        let fx = Fixture::new(false);
        let a = fx.file("a.txt", "XXXXXXXXXX");

        assert_eq!(fx.classifier().classify(&a, false), Outcome::Accepted);
        assert!(a.exists());
        assert!(fx.index.size_seen(10));
        assert_eq!(fx.index.hash_count(), 1);
    }

    #[test]
    fn test_exact_duplicate_is_removed() {
        let fx = Fixture::new(false);
        let a = fx.file("a.txt", "XXXXXXXXXX");
        let b = fx.file("b.txt", "XXXXXXXXXX");
        let classifier = fx.classifier();

        assert_eq!(classifier.classify(&a, false), Outcome::Accepted);
        assert_eq!(classifier.classify(&b, false), Outcome::Removed);
        assert!(a.exists());
        assert!(!b.exists());
        assert_eq!(fx.index.removed_count(), 1);
        assert_eq!(fx.index.removed_bytes(), 10);
    }

    #[test]
    fn test_exact_duplicate_is_removed_even_when_moving() {
        let fx = Fixture::new(true);
        let a = fx.file("a.txt", "XXXXXXXXXX");
        let b = fx.file("b.txt", "XXXXXXXXXX");
        let classifier = fx.classifier();

        classifier.classify(&a, true);
        assert_eq!(classifier.classify(&b, true), Outcome::Removed);
        assert!(!fx.dir.path().join("out/b.txt").exists());
        assert_eq!(fx.index.moved_count(), 0);
    }

    #[test]
    fn test_same_size_different_content_is_moved() {
        let fx = Fixture::new(true);
        let a = fx.file("a.txt", "XXXXXXXXXX");
        let b = fx.file("b.txt", "YYYYYYYYYY");
        let classifier = fx.classifier();

        classifier.classify(&a, true);
        let expected = fx.dir.path().join("out").join("b.txt");
        assert_eq!(classifier.classify(&b, true), Outcome::Moved(expected.clone()));
        assert!(!b.exists());
        assert_eq!(fs::read_to_string(&expected).unwrap(), "YYYYYYYYYY");
        assert_eq!(fx.index.moved_count(), 1);
        assert_eq!(fx.index.moved_bytes(), 10);
        assert_eq!(fx.index.removed_count(), 0);
        assert_eq!(fx.index.hash_count(), 2);
    }

    #[test]
    fn test_same_size_different_content_accepted_without_moving() {
        let fx = Fixture::new(false);
        let a = fx.file("a.txt", "XXXXXXXXXX");
        let b = fx.file("b.txt", "YYYYYYYYYY");
        let classifier = fx.classifier();

        classifier.classify(&a, false);
        assert_eq!(classifier.classify(&b, false), Outcome::Accepted);
        assert!(b.exists());
        assert_eq!(fx.index.removed_count(), 0);
    }

    #[test]
    fn test_move_flag_without_destination_accepts() {
        let fx = Fixture::new(false);
        let a = fx.file("a.txt", "XXXXXXXXXX");
        let b = fx.file("b.txt", "YYYYYYYYYY");
        let classifier = fx.classifier();

        classifier.classify(&a, true);
        assert_eq!(classifier.classify(&b, true), Outcome::Accepted);
        assert!(b.exists());
    }

    #[test]
    fn test_match_of_moved_content_is_removed() {
        let fx = Fixture::new(true);
        let a = fx.file("a.txt", "XXXXXXXXXX");
        let b = fx.file("b.txt", "YYYYYYYYYY");
        let c = fx.file("c.txt", "YYYYYYYYYY");
        let classifier = fx.classifier();

        classifier.classify(&a, true);
        assert!(matches!(classifier.classify(&b, true), Outcome::Moved(_)));
        assert_eq!(classifier.classify(&c, true), Outcome::Removed);
        assert!(!c.exists());
        assert!(fx.dir.path().join("out/b.txt").exists());
    }

    #[test]
    fn test_missing_file_is_error() {
        let fx = Fixture::new(false);
        let outcome = fx
            .classifier()
            .classify(&fx.dir.path().join("in/ghost.txt"), false);
        match outcome {
            Outcome::Error(e) => assert_eq!(e.kind, ScanErrorKind::NotFound),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(fx.index.size_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_undeletable_duplicate_is_error_and_not_counted() {
        use std::os::unix::fs::PermissionsExt;

        let fx = Fixture::new(false);
        let a = fx.file("a.txt", "XXXXXXXXXX");
        let b = fx.file("b.txt", "XXXXXXXXXX");
        let input = fx.dir.path().join("in");
        fs::set_permissions(&input, fs::Permissions::from_mode(0o555)).unwrap();
        if fs::write(input.join("write-check"), "x").is_ok() {
            fs::set_permissions(&input, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let classifier = fx.classifier();

        assert_eq!(classifier.classify(&a, false), Outcome::Accepted);
        let outcome = classifier.classify(&b, false);
        fs::set_permissions(&input, fs::Permissions::from_mode(0o755)).unwrap();

        match outcome {
            Outcome::Error(e) => assert_eq!(e.kind, ScanErrorKind::ActionFailed),
            other => panic!("expected error, got {:?}", other),
        }
        assert!(b.exists());
        assert_eq!(fx.index.removed_count(), 0);
        assert_eq!(fx.index.removed_bytes(), 0);
    }

    #[cfg(windows)]
    #[test]
    fn test_read_only_duplicate_is_removed() {
        let fx = Fixture::new(false);
        let a = fx.file("a.txt", "XXXXXXXXXX");
        let b = fx.file("b.txt", "XXXXXXXXXX");
        let mut permissions = fs::metadata(&b).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&b, permissions).unwrap();
        let classifier = fx.classifier();

        classifier.classify(&a, false);
        assert_eq!(classifier.classify(&b, false), Outcome::Removed);
        assert!(!b.exists());
    }

    #[test]
    fn test_decisions_reach_audit_log() {
        let fx = Fixture::new(false);
        let audit = AuditLog::open(&fx.config.log_dir()).unwrap();
        let classifier = Classifier::new(&fx.config, &fx.index, &audit);
        let a = fx.file("a.txt", "XXXXXXXXXX");
        let b = fx.file("b.txt", "XXXXXXXXXX");

        classifier.classify(&a, false);
        classifier.classify(&b, false);

        let removed = fs::read_to_string(fx.config.log_dir().join("removed.log")).unwrap();
        let new = fs::read_to_string(fx.config.log_dir().join("new.log")).unwrap();
        assert!(removed.contains("b.txt"));
        assert!(new.contains("a.txt"));
    }
}
