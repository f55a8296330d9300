//! Shared fingerprint index
//!
//! One [`FingerprintIndex`] is created per run and handed to every worker by
//! reference. The size and hash sets are sharded concurrent maps and the
//! counters are atomics, so no caller ever holds a lock across file I/O.

use dashmap::DashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::{CacheSnapshot, CacheStore};
use crate::config::ScanConfig;

/// Seen sizes and digests plus the run's removal/move counters.
///
/// Keys are only ever inserted. The `mark_*` calls report whether the key
/// was new, and of several workers racing on one key exactly one wins.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    sizes: DashSet<u64>,
    hashes: DashSet<String>,
    removed_bytes: AtomicU64,
    removed_count: AtomicU64,
    moved_bytes: AtomicU64,
    moved_count: AtomicU64,
}

impl FingerprintIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the index for a run, pre-populated from the cache when the
    /// config allows reading it. A missing or corrupt cache is logged and
    /// the run starts empty.
    pub fn open(config: &ScanConfig) -> Self {
        if !config.cache_readable {
            return Self::new();
        }
        let store = CacheStore::new(config.cache_dir());
        match store.load() {
            Ok(snapshot) => {
                warn_if_populated(&snapshot, store.dir());
                let index = Self::from_snapshot(&snapshot);
                log::info!(
                    "Loaded fingerprint cache from {}: {} sizes, {} hashes",
                    store.dir().display(),
                    index.size_count(),
                    index.hash_count()
                );
                index
            }
            Err(e) => {
                log::warn!("Fingerprint cache not loaded, starting empty: {}", e);
                Self::new()
            }
        }
    }

    /// Build an index from persisted maps. Entries whose value is `false` or
    /// whose size key is not a number are skipped.
    pub fn from_snapshot(snapshot: &CacheSnapshot) -> Self {
        let index = Self::new();
        for (key, seen) in &snapshot.sizes {
            if !*seen {
                continue;
            }
            match key.parse::<u64>() {
                Ok(size) => {
                    index.mark_size(size);
                }
                Err(_) => log::warn!("Ignoring non-numeric size key {:?} in cache", key),
            }
        }
        for (digest, seen) in &snapshot.hashes {
            if *seen {
                index.mark_hash(digest);
            }
        }
        index
    }

    /// Write the maps to the cache directory if the config allows it.
    /// Returns whether the cache was written; failures are logged only.
    pub fn persist(&self, config: &ScanConfig) -> bool {
        if !config.cache_writable {
            log::debug!("Cache writing disabled, index not persisted");
            return false;
        }
        let store = CacheStore::new(config.cache_dir());
        match store.save(&self.snapshot()) {
            Ok(()) => {
                log::info!(
                    "Saved fingerprint cache to {}: {} sizes, {} hashes",
                    store.dir().display(),
                    self.size_count(),
                    self.hash_count()
                );
                true
            }
            Err(e) => {
                log::error!("Failed to save fingerprint cache: {}", e);
                false
            }
        }
    }

    pub fn size_seen(&self, size: u64) -> bool {
        self.sizes.contains(&size)
    }

    /// Record `size`; true if it was not present before
    pub fn mark_size(&self, size: u64) -> bool {
        self.sizes.insert(size)
    }

    pub fn hash_seen(&self, digest: &str) -> bool {
        self.hashes.contains(digest)
    }

    /// Record `digest`; true if it was not present before
    pub fn mark_hash(&self, digest: &str) -> bool {
        !self.hashes.contains(digest) && self.hashes.insert(digest.to_string())
    }

    pub fn add_removed(&self, bytes: u64, count: u64) {
        self.removed_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.removed_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_moved(&self, bytes: u64, count: u64) {
        self.moved_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.moved_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn removed_bytes(&self) -> u64 {
        self.removed_bytes.load(Ordering::Relaxed)
    }

    pub fn removed_count(&self) -> u64 {
        self.removed_count.load(Ordering::Relaxed)
    }

    pub fn moved_bytes(&self) -> u64 {
        self.moved_bytes.load(Ordering::Relaxed)
    }

    pub fn moved_count(&self) -> u64 {
        self.moved_count.load(Ordering::Relaxed)
    }

    /// Number of distinct sizes seen
    pub fn size_count(&self) -> usize {
        self.sizes.len()
    }

    /// Number of distinct digests seen
    pub fn hash_count(&self) -> usize {
        self.hashes.len()
    }

    /// Copy of both maps in their persisted shape
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            sizes: self
                .sizes
                .iter()
                .map(|size| (size.key().to_string(), true))
                .collect(),
            hashes: self
                .hashes
                .iter()
                .map(|digest| (digest.key().clone(), true))
                .collect(),
        }
    }
}

/// A populated cache makes every already-fingerprinted file a duplicate,
/// including the originals if their base path is scanned again. Returns
/// whether the warning was logged.
fn warn_if_populated(snapshot: &CacheSnapshot, dir: &Path) -> bool {
    if snapshot.is_empty() {
        return false;
    }
    log::warn!(
        "Fingerprint cache in {} already lists {} sizes; files matching it will be \
         removed, including originals if a previously swept base path is scanned again",
        dir.display(),
        snapshot.sizes.len()
    );
    true
}
