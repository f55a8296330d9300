//! Fingerprint cache persistence
//!
//! The index is stored as two flat JSON objects, `size-dict.json` and
//! `hash-dict.json`, each mapping a key to `true`. Writes go to a temporary
//! sibling first and are renamed into place, so an interrupted run leaves
//! either the old cache or the new one, never a truncated file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// File name of the hash map document
pub const HASH_CACHE_FILE: &str = "hash-dict.json";

/// File name of the size map document
pub const SIZE_CACHE_FILE: &str = "size-dict.json";

/// Serializable copy of the index maps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    /// Decimal byte size → seen
    pub sizes: BTreeMap<String, bool>,
    /// Hex digest → seen
    pub hashes: BTreeMap<String, bool>,
}

impl CacheSnapshot {
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty() && self.hashes.is_empty()
    }
}

/// Reads and writes the two cache documents in one directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn size_path(&self) -> PathBuf {
        self.dir.join(SIZE_CACHE_FILE)
    }

    pub fn hash_path(&self) -> PathBuf {
        self.dir.join(HASH_CACHE_FILE)
    }

    /// Load both documents. Fails if either is missing or corrupt.
    pub fn load(&self) -> Result<CacheSnapshot, CacheError> {
        Ok(CacheSnapshot {
            sizes: read_document(&self.size_path())?,
            hashes: read_document(&self.hash_path())?,
        })
    }

    /// Replace both documents with `snapshot`
    pub fn save(&self, snapshot: &CacheSnapshot) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Write {
            path: self.dir.clone(),
            source,
        })?;
        write_document(&self.size_path(), &snapshot.sizes)?;
        write_document(&self.hash_path(), &snapshot.hashes)?;
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<BTreeMap<String, bool>, CacheError> {
    let file = File::open(path).map_err(|source| CacheError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CacheError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn write_document(path: &Path, map: &BTreeMap<String, bool>) -> Result<(), CacheError> {
    let write_err = |source: std::io::Error| CacheError::Write {
        path: path.to_path_buf(),
        source,
    };

    let tmp_path = path.with_extension("json.tmp");
    let file = File::create(&tmp_path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, map).map_err(|e| write_err(e.into()))?;
    writer.flush().map_err(write_err)?;
    writer
        .into_inner()
        .map_err(|e| write_err(e.into_error()))?
        .sync_all()
        .map_err(write_err)?;

    fs::rename(&tmp_path, path).map_err(write_err)
}
