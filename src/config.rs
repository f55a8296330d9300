//! Configuration for the duplicate sweeper
//!
//! The on-disk document keeps the upper-case field names produced by the
//! settings tool. It is validated once into an immutable [`ScanConfig`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Default hashing buffer (64 KiB)
pub const DEFAULT_BUFF_SIZE: usize = 64 * 1024;

/// Default location of the configuration document
pub const DEFAULT_CONFIG_PATH: &str = "configs/config.json";

/// Extension entries that accept every file
const WILDCARD_EXTENSIONS: [&str; 2] = ["*.*", "*"];

/// Raw configuration document as written by the settings tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(rename = "BUFF_SIZE", default)]
    pub buff_size: Option<usize>,

    #[serde(rename = "FILE_EXTENSIONS", default)]
    pub file_extensions: Vec<String>,

    #[serde(rename = "DEST_PATH", default)]
    pub dest_path: Option<String>,

    #[serde(rename = "BASE_PATH", default)]
    pub base_path: Vec<String>,

    #[serde(rename = "IS_CACHE_WRITABLE", default)]
    pub is_cache_writable: Option<bool>,

    #[serde(rename = "IS_CACHE_READABLE", default)]
    pub is_cache_readable: Option<bool>,
}

impl ConfigDocument {
    /// Read and parse a document from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the document, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        fs::write(path, json).map_err(write_err)
    }
}

impl From<&ScanConfig> for ConfigDocument {
    fn from(config: &ScanConfig) -> Self {
        let file_extensions = match &config.extensions {
            ExtensionFilter::Any => vec![WILDCARD_EXTENSIONS[0].to_string()],
            ExtensionFilter::Only(set) => set.iter().cloned().collect(),
        };
        Self {
            buff_size: Some(config.buff_size),
            file_extensions,
            dest_path: config
                .dest_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            base_path: config
                .base_paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            is_cache_writable: Some(config.cache_writable),
            is_cache_readable: Some(config.cache_readable),
        }
    }
}

/// Which file extensions are classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionFilter {
    /// Every regular file, with or without an extension
    Any,
    /// Lowercased extensions without a leading dot
    Only(BTreeSet<String>),
}

impl ExtensionFilter {
    /// Build a filter from user-supplied entries, normalizing case and dots
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if WILDCARD_EXTENSIONS.contains(&entry) {
                return ExtensionFilter::Any;
            }
            let ext = entry.trim_start_matches('.').to_lowercase();
            if !ext.is_empty() {
                set.insert(ext);
            }
        }
        ExtensionFilter::Only(set)
    }

    /// Check whether `path` has an accepted extension (case-insensitive)
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            ExtensionFilter::Any => true,
            ExtensionFilter::Only(set) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| set.contains(&e.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

/// Validated, immutable configuration for one run
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Chunk size used when streaming files into the hasher
    pub buff_size: usize,

    /// Extensions to classify
    pub extensions: ExtensionFilter,

    /// Base directories, in configured order
    pub base_paths: Vec<PathBuf>,

    /// Where same-size/different-content files are relocated.
    /// `None` disables moving.
    pub dest_path: Option<PathBuf>,

    /// Load the fingerprint cache at startup
    pub cache_readable: bool,

    /// Save the fingerprint cache at run end
    pub cache_writable: bool,

    /// Root for the `cache/` and `logs/` directories
    pub work_dir: PathBuf,

    /// Worker threads. 0 means one per available CPU
    pub num_threads: usize,

    /// Emit JSON progress lines on stderr
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            buff_size: DEFAULT_BUFF_SIZE,
            extensions: ExtensionFilter::from_entries(Self::default_extensions()),
            base_paths: Vec::new(),
            dest_path: None,
            cache_readable: false,
            cache_writable: false,
            work_dir: PathBuf::from("."),
            num_threads: 0,
            show_progress: false,
        }
    }
}

impl ScanConfig {
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }

    /// Load and validate the document at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let document = ConfigDocument::load(path)?;
        let config = Self::from_document(document)?;
        log::debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Validate a raw document
    pub fn from_document(document: ConfigDocument) -> Result<Self, ConfigError> {
        let buff_size = document.buff_size.unwrap_or(DEFAULT_BUFF_SIZE);
        if buff_size == 0 {
            return Err(ConfigError::Invalid("BUFF_SIZE must be positive".into()));
        }

        let base_paths: Vec<PathBuf> = document
            .base_path
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect();
        if base_paths.is_empty() {
            return Err(ConfigError::Invalid("BASE_PATH lists no directories".into()));
        }

        let dest_path = document
            .dest_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        if let Some(dest) = &dest_path {
            if dest.exists() && !dest.is_dir() {
                return Err(ConfigError::Invalid(format!(
                    "DEST_PATH {} is not a directory",
                    dest.display()
                )));
            }
        }

        Ok(Self {
            buff_size,
            extensions: ExtensionFilter::from_entries(&document.file_extensions),
            base_paths,
            dest_path,
            cache_readable: document.is_cache_readable.unwrap_or(false),
            cache_writable: document.is_cache_writable.unwrap_or(false),
            ..Default::default()
        })
    }

    /// Extensions offered by the settings tool
    pub fn default_extensions() -> Vec<String> {
        [
            "jpg", "jpeg", "png", "gif", "bmp", "wav", "mp3", "mp4", "ogg", "mov",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Whether same-size/different-content files get relocated
    pub fn move_enabled(&self) -> bool {
        self.dest_path.is_some()
    }

    /// Directory holding `hash-dict.json` and `size-dict.json`
    pub fn cache_dir(&self) -> PathBuf {
        self.work_dir.join("cache")
    }

    /// Directory holding the audit logs
    pub fn log_dir(&self) -> PathBuf {
        self.work_dir.join("logs")
    }

    /// Worker count, resolving 0 to the available parallelism
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            self.num_threads
        }
    }
}

/// Fluent construction of a [`ScanConfig`] without a document on disk
#[derive(Debug, Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base directories
    pub fn base_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.config.base_paths = paths;
        self
    }

    /// Add a base directory
    pub fn add_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_paths.push(path.into());
        self
    }

    /// Set the accepted extensions
    pub fn extensions<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.extensions = ExtensionFilter::from_entries(entries);
        self
    }

    /// Set the destination for moved files
    pub fn dest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dest_path = Some(path.into());
        self
    }

    /// Set the hashing buffer size
    pub fn buff_size(mut self, size: usize) -> Self {
        self.config.buff_size = size.max(1);
        self
    }

    pub fn cache_readable(mut self, enabled: bool) -> Self {
        self.config.cache_readable = enabled;
        self
    }

    pub fn cache_writable(mut self, enabled: bool) -> Self {
        self.config.cache_writable = enabled;
        self
    }

    /// Set the root for cache and log directories
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    pub fn build(self) -> ScanConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn document(json: &str) -> ConfigDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_document_field_names() {
        let doc = document(
            r#"{
                "BUFF_SIZE": 4096,
                "FILE_EXTENSIONS": ["JPG", ".png"],
                "DEST_PATH": "/out/",
                "BASE_PATH": ["/photos/", "/music/"],
                "IS_CACHE_WRITABLE": true,
                "IS_CACHE_READABLE": null
            }"#,
        );
        let config = ScanConfig::from_document(doc).unwrap();

        assert_eq!(config.buff_size, 4096);
        assert_eq!(
            config.base_paths,
            vec![PathBuf::from("/photos/"), PathBuf::from("/music/")]
        );
        assert_eq!(config.dest_path, Some(PathBuf::from("/out/")));
        assert!(config.cache_writable);
        assert!(!config.cache_readable);
        assert!(config.move_enabled());
        assert_eq!(
            config.extensions,
            ExtensionFilter::Only(["jpg", "png"].iter().map(|s| s.to_string()).collect())
        );
    }

    #[test]
    fn test_empty_dest_disables_moving() {
        let doc = document(r#"{"BASE_PATH": ["/a"], "DEST_PATH": ""}"#);
        let config = ScanConfig::from_document(doc).unwrap();
        assert!(!config.move_enabled());
        assert_eq!(config.buff_size, DEFAULT_BUFF_SIZE);
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let doc = document(r#"{"BASE_PATH": ["/a"], "BUFF_SIZE": 0}"#);
        assert!(matches!(
            ScanConfig::from_document(doc),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_base_path_rejected() {
        let doc = document(r#"{"BASE_PATH": []}"#);
        assert!(matches!(
            ScanConfig::from_document(doc),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ScanConfig::load(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_unparsable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ScanConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs").join("config.json");
        let config = ScanConfig::builder()
            .add_base_path("/media/")
            .extensions(["mp3"])
            .cache_writable(true)
            .build();

        ConfigDocument::from(&config).save(&path).unwrap();
        let loaded = ScanConfig::load(&path).unwrap();

        assert_eq!(loaded.base_paths, config.base_paths);
        assert_eq!(loaded.extensions, config.extensions);
        assert!(loaded.cache_writable);
        assert!(!loaded.move_enabled());
    }

    #[test]
    fn test_wildcard_accepts_everything() {
        let filter = ExtensionFilter::from_entries(["*.*"]);
        assert_eq!(filter, ExtensionFilter::Any);
        assert!(filter.matches(Path::new("/x/README")));
        assert!(filter.matches(Path::new("/x/a.bin")));
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let filter = ExtensionFilter::from_entries(["txt"]);
        assert!(filter.matches(Path::new("/x/a.txt")));
        assert!(filter.matches(Path::new("/x/A.TXT")));
        assert!(!filter.matches(Path::new("/x/a.jpg")));
        assert!(!filter.matches(Path::new("/x/txt")));
    }

    #[test]
    fn test_effective_threads() {
        let config = ScanConfig::builder().num_threads(8).build();
        assert_eq!(config.effective_threads(), 8);
        assert!(ScanConfig::default().effective_threads() > 0);
    }

    proptest! {
        #[test]
        fn prop_extension_case_never_matters(ext in "[a-z0-9]{1,6}", upper in any::<bool>()) {
            let filter = ExtensionFilter::from_entries([ext.to_uppercase()]);
            let name = if upper { ext.to_uppercase() } else { ext.clone() };
            let path = PathBuf::from(format!("/d/file.{}", name));
            prop_assert!(filter.matches(&path));
        }
    }
}
