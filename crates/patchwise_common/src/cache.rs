//! Catalog cache with TTL
//!
//! Two stores share the `CatalogCache` contract:
//! - `MemoryCache`: LRU map with insertion timestamps, for long-lived hosts
//! - `FileCache`: one JSON file per key, for short-lived CLI runs
//!
//! A stale entry is never returned; it is evicted on the read that finds it.

use crate::catalog::Catalog;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Key the version catalog is stored under
pub const CATALOG_CACHE_KEY: &str = "update-versions";

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// TTL key/value store for version catalogs
pub trait CatalogCache {
    /// Fresh catalog for `key`, or `None` on a miss or a stale entry
    fn get(&self, key: &str) -> Option<Catalog>;

    /// Store `catalog` under `key` for `ttl`
    fn set(&self, key: &str, catalog: &Catalog, ttl: Duration) -> Result<(), CacheError>;
}

impl<T: CatalogCache + ?Sized> CatalogCache for Arc<T> {
    fn get(&self, key: &str) -> Option<Catalog> {
        (**self).get(key)
    }

    fn set(&self, key: &str, catalog: &Catalog, ttl: Duration) -> Result<(), CacheError> {
        (**self).set(key, catalog, ttl)
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    catalog: Catalog,
    inserted_at: Instant,
    ttl: Duration,
}

impl MemoryEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) < self.ttl
    }
}

/// In-process LRU cache
pub struct MemoryCache {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(16)
    }
}

impl CatalogCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Catalog> {
        let mut entries = self.entries.lock().ok()?;
        let now = Instant::now();

        if let Some(entry) = entries.get(key) {
            if entry.is_fresh(now) {
                return Some(entry.catalog.clone());
            }
            // Expired, drop it so the caller refetches
            debug!("Cache entry {} expired", key);
            entries.pop(key);
        }
        None
    }

    fn set(&self, key: &str, catalog: &Catalog, ttl: Duration) -> Result<(), CacheError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key.to_string(),
                MemoryEntry {
                    catalog: catalog.clone(),
                    inserted_at: Instant::now(),
                    ttl,
                },
            );
        }
        Ok(())
    }
}

/// On-disk cache record
#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    stored_at: DateTime<Utc>,
    ttl_ms: u64,
    catalog: Catalog,
}

impl FileEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age_ms = now
            .signed_duration_since(self.stored_at)
            .num_milliseconds();
        // Entries stamped in the future count as stale
        age_ms >= 0 && (age_ms as u64) < self.ttl_ms
    }
}

/// JSON file cache, one file per key in `dir`
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }

    fn remove(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove cache file {}: {}", path.display(), e);
        }
    }
}

impl CatalogCache for FileCache {
    fn get(&self, key: &str) -> Option<Catalog> {
        let path = self.entry_path(key);
        let content = fs::read_to_string(&path).ok()?;

        let entry: FileEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                self.remove(&path);
                return None;
            }
        };

        if entry.is_fresh(Utc::now()) {
            Some(entry.catalog)
        } else {
            debug!("Cache file {} expired", path.display());
            self.remove(&path);
            None
        }
    }

    fn set(&self, key: &str, catalog: &Catalog, ttl: Duration) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let entry = FileEntry {
            stored_at: Utc::now(),
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            catalog: catalog.clone(),
        };
        let content = serde_json::to_string_pretty(&entry)?;

        // Write then rename so a reader never sees a half-written file
        let path = self.entry_path(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|source| CacheError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &path).map_err(|source| CacheError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;
    use std::thread;

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert(Version::new("1.1"), "https://example.com/1.1.zip".to_string());
        catalog.insert(Version::new("1.2"), "https://example.com/1.2.zip".to_string());
        catalog
    }

    #[test]
    fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::default();
        assert!(cache.get(CATALOG_CACHE_KEY).is_none());

        cache
            .set(CATALOG_CACHE_KEY, &sample_catalog(), Duration::from_secs(60))
            .unwrap();
        assert_eq!(cache.get(CATALOG_CACHE_KEY), Some(sample_catalog()));
    }

    #[test]
    fn test_memory_cache_expiration() {
        let cache = MemoryCache::default();
        cache
            .set(CATALOG_CACHE_KEY, &sample_catalog(), Duration::from_millis(50))
            .unwrap();

        thread::sleep(Duration::from_millis(100));

        assert!(cache.get(CATALOG_CACHE_KEY).is_none(), "Entry should have expired");
        assert!(cache.is_empty(), "Expired entry should be evicted");
    }

    #[test]
    fn test_memory_cache_zero_ttl_never_hits() {
        let cache = MemoryCache::default();
        cache.set(CATALOG_CACHE_KEY, &sample_catalog(), Duration::ZERO).unwrap();
        assert!(cache.get(CATALOG_CACHE_KEY).is_none());
    }

    #[test]
    fn test_memory_cache_lru_eviction() {
        let cache = MemoryCache::new(1);
        let ttl = Duration::from_secs(60);
        cache.set("a", &sample_catalog(), ttl).unwrap();
        cache.set("b", &sample_catalog(), ttl).unwrap();

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_file_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache"));

        cache
            .set(CATALOG_CACHE_KEY, &sample_catalog(), Duration::from_secs(60))
            .unwrap();

        assert!(dir.path().join("cache/update-versions.json").exists());
        assert_eq!(cache.get(CATALOG_CACHE_KEY), Some(sample_catalog()));
    }

    #[test]
    fn test_file_cache_expiration_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        cache
            .set(CATALOG_CACHE_KEY, &sample_catalog(), Duration::from_millis(50))
            .unwrap();
        thread::sleep(Duration::from_millis(100));

        assert!(cache.get(CATALOG_CACHE_KEY).is_none());
        assert!(!dir.path().join("update-versions.json").exists());
    }

    #[test]
    fn test_file_cache_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        fs::write(dir.path().join("update-versions.json"), "{not json").unwrap();

        assert!(cache.get(CATALOG_CACHE_KEY).is_none());
    }

    #[test]
    fn test_file_entry_future_timestamp_is_stale() {
        let entry = FileEntry {
            stored_at: Utc::now() + chrono::Duration::hours(1),
            ttl_ms: 60_000,
            catalog: Catalog::new(),
        };
        assert!(!entry.is_fresh(Utc::now()));
    }
}
