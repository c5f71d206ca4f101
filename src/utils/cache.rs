//! Persistent fragment cache
//!
//! Rendering goes through a child process and is by far the slowest step, so
//! finished fragments are memoized across runs. The key is the normalized
//! fragment (before macro expansion); the value is the final HTML.
//!
//! The key abstraction is the `CacheStore` trait:
//! - `FileCache`: JSON file on disk, opened at start and closed at exit (CLI)
//! - `MemoryCache`: in-process map (testing, library callers)

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::utils::error::CacheError;

/// Default cache file name
pub const DEFAULT_CACHE_PATH: &str = "math.cache";

/// Key/value contract the pipeline relies on
pub trait CacheStore {
    /// Look up a rendered fragment
    fn get(&self, key: &str) -> Option<String>;

    /// Store a rendered fragment
    fn put(&mut self, key: &str, value: &str);

    /// Flush pending writes to the backing store
    fn persist(&mut self) -> Result<(), CacheError>;

    /// Number of stored entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// File-backed cache
///
/// Entries are kept in memory and written out by [`FileCache::close`] or
/// [`CacheStore::persist`]. Writes go to a sibling temporary file that is then
/// renamed over the cache, so an interrupted run never leaves a torn file.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl FileCache {
    /// Open the cache at `path`. A missing file is an empty cache; an
    /// unreadable or unparseable file is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| CacheError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(CacheError::Read { path, source }),
        };

        info!(path = %path.display(), entries = entries.len(), "opened fragment cache");
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop every entry (takes effect on the next persist)
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }

    /// Total size of all stored fragments in bytes
    pub fn value_bytes(&self) -> usize {
        self.entries.values().map(String::len).sum()
    }

    /// Persist and release the cache
    pub fn close(mut self) -> Result<(), CacheError> {
        self.persist()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
        self.dirty = true;
    }

    fn persist(&mut self) -> Result<(), CacheError> {
        if !self.dirty {
            return Ok(());
        }

        let json = serde_json::to_string(&self.entries).map_err(CacheError::Serialize)?;
        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|source| CacheError::Write {
            path: temp.clone(),
            source,
        })?;
        fs::rename(&temp, &self.path).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })?;

        self.dirty = false;
        info!(path = %self.path.display(), entries = self.entries.len(), "persisted fragment cache");
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Drop for FileCache {
    fn drop(&mut self) {
        if self.dirty {
            warn!(
                path = %self.path.display(),
                "fragment cache dropped without close; new entries were not saved"
            );
        }
    }
}

/// In-memory cache (for testing and callers that manage persistence themselves)
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: BTreeMap<String, String>,
    persisted: usize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `persist` was called
    pub fn persist_count(&self) -> usize {
        self.persisted
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: &str) {
        debug!(key, "cached fragment in memory");
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn persist(&mut self) -> Result<(), CacheError> {
        self.persisted += 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path().join("math.cache")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_round_trip_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("math.cache");

        let mut cache = FileCache::open(&path).unwrap();
        cache.put("\\mathrm{x}", "<span>x</span>");
        cache.put("\\mathrm{‘y’}", "<span>y</span>");
        cache.close().unwrap();

        let cache = FileCache::open(&path).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("\\mathrm{x}").as_deref(), Some("<span>x</span>"));
        assert_eq!(cache.get("\\mathrm{‘y’}").as_deref(), Some("<span>y</span>"));
        assert!(!dir.path().join("math.cache.tmp").exists());
    }

    #[test]
    fn test_close_without_changes_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("math.cache");
        FileCache::open(&path).unwrap().close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_without_close_loses_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("math.cache");
        {
            let mut cache = FileCache::open(&path).unwrap();
            cache.put("k", "v");
        }
        assert!(FileCache::open(&path).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("math.cache");
        fs::write(&path, "not json").unwrap();
        let err = FileCache::open(&path).unwrap_err();
        assert!(matches!(err, CacheError::Parse { .. }));
    }

    #[test]
    fn test_unwritable_location_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("math.cache");
        let mut cache = FileCache::open(&path).unwrap();
        cache.put("k", "v");
        let err = cache.persist().unwrap_err();
        assert!(matches!(err, CacheError::Write { .. }));
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("math.cache");
        let mut cache = FileCache::open(&path).unwrap();
        cache.put("a", "1");
        cache.close().unwrap();

        let mut cache = FileCache::open(&path).unwrap();
        cache.clear();
        cache.close().unwrap();
        assert!(FileCache::open(&path).unwrap().is_empty());
    }

    #[test]
    fn test_memory_cache() {
        let mut cache = MemoryCache::new();
        assert_eq!(cache.get("a"), None);
        cache.put("a", "1");
        cache.put("a", "2");
        assert_eq!(cache.get("a").as_deref(), Some("2"));
        assert_eq!(cache.len(), 1);
        cache.persist().unwrap();
        assert_eq!(cache.persist_count(), 1);
    }
}
