//! Disk cache for fetched pages
//!
//! Every absolute URL maps to one file named after the SHA-256 digest of the
//! URL. A file holds `{"timestamp": <epoch seconds>, "content": "<body>"}` and
//! is considered fresh for the configured TTL (300 seconds by default).
//!
//! Reads never fail: a missing, unreadable, undecodable or stale file is
//! reported as a miss, and the broken or stale file is removed. Writes go
//! through a temporary file in the cache directory followed by a rename, so a
//! reader never observes a partially written entry.
//!
//! The store also owns the table of in-flight fetches, so every client built on
//! the same store coalesces concurrent requests for one URL.

use std::collections::HashMap;
use std::fs::{self, File, Metadata};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;

/// Default time-to-live of a cache entry
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Name of the cache folder created under the system temp directory
const CACHE_DIR_NAME: &str = "metallum_cache";

/// On-disk representation of a cached page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fetch time in seconds since the Unix epoch
    pub timestamp: f64,
    /// Raw document body
    pub content: String,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn now(content: impl Into<String>) -> Self {
        Self {
            timestamp: epoch_seconds(),
            content: content.into(),
        }
    }

    /// Age of the entry in seconds, relative to `now`.
    fn age(&self, now: f64) -> f64 {
        now - self.timestamp
    }
}

/// Per-URL fetch locks, shared by every client of one store
type FlightTable = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// TTL-based page cache keyed by URL digest.
///
/// Clones share the in-flight table.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    ttl: Duration,
    in_flight: Arc<FlightTable>,
}

impl CacheStore {
    /// Create a cache rooted at `dir` with the given TTL.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            in_flight: Arc::default(),
        }
    }

    /// Cache under `<temp dir>/metallum_cache` with the default TTL.
    pub fn default_location() -> Self {
        Self::new(default_cache_dir(), DEFAULT_CACHE_TTL)
    }

    /// Directory holding the cache files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Time-to-live of an entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Storage key of an absolute URL: its lowercase hex SHA-256 digest.
    ///
    /// # Example
    /// ```
    /// use metallum_core::cache::CacheStore;
    ///
    /// let key = CacheStore::key_for("https://www.metal-archives.com/bands/_/125");
    /// assert_eq!(key.len(), 64);
    /// ```
    pub fn key_for(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        format!("{:x}", digest)
    }

    /// Path of the cache file for `url`.
    pub fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.cache", Self::key_for(url)))
    }

    /// Read the cached body for `url`, if a fresh entry exists.
    pub fn read(&self, url: &str) -> Option<String> {
        let path = self.entry_path(url);
        let (raw, seen) = match read_entry_file(&path) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Unreadable cache entry for {}: {}", url, e);
                self.evict(&path, None);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Corrupt cache entry for {}: {}", url, e);
                self.evict(&path, Some(&seen));
                return None;
            }
        };

        if entry.age(epoch_seconds()) > self.ttl.as_secs_f64() {
            debug!("Stale cache entry for {}", url);
            self.evict(&path, Some(&seen));
            return None;
        }

        if entry.content.is_empty() {
            return None;
        }

        debug!("Cache hit for {}", url);
        Some(entry.content)
    }

    /// Store `content` for `url`, stamped with the current time.
    ///
    /// # Errors
    /// Returns `MetallumError::Cache` if the directory or file cannot be written.
    pub fn write(&self, url: &str, content: &str) -> Result<()> {
        self.write_entry(url, &CacheEntry::now(content))
    }

    /// Store a prepared entry for `url`.
    pub(crate) fn write_entry(&self, url: &str, entry: &CacheEntry) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_vec(entry)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.persist(self.entry_path(url)).map_err(|e| e.error)?;

        debug!("Cached {} bytes for {}", entry.content.len(), url);
        Ok(())
    }

    /// Drop the entry for `url`, if any.
    pub fn invalidate(&self, url: &str) {
        self.remove(&self.entry_path(url));
    }

    /// Register interest in `url` and return its fetch lock.
    ///
    /// Callers holding the lock for the same URL run one at a time, whichever
    /// client they go through.
    pub(crate) fn join_flight(&self, url: &str) -> InFlight<'_> {
        let mut table = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let slot = table
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        InFlight {
            table: &self.in_flight,
            key: url.to_string(),
            slot,
        }
    }

    /// Number of URLs with a fetch in progress.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Remove a broken or stale file, unless a writer replaced it since `seen`.
    ///
    /// A rename racing between the check and the removal can still be lost;
    /// the next read then misses and refetches.
    fn evict(&self, path: &Path, seen: Option<&Metadata>) {
        let Ok(current) = fs::metadata(path) else {
            return;
        };
        if let Some(seen) = seen {
            if !same_version(seen, &current) {
                debug!("Cache file {} was replaced, keeping it", path.display());
                return;
            }
        }
        self.remove(path);
    }

    fn remove(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove cache file {}: {}", path.display(), e);
            }
        }
    }
}

/// Handle on a per-URL fetch lock; the table entry goes away with the last handle.
pub(crate) struct InFlight<'a> {
    table: &'a FlightTable,
    key: String,
    slot: Arc<Mutex<()>>,
}

impl InFlight<'_> {
    /// Wait for the URL's fetch lock.
    pub(crate) async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.slot.lock().await
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut table = self
            .table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // The table and this handle are the only owners left
        if Arc::strong_count(&self.slot) <= 2 {
            table.remove(&self.key);
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::default_location()
    }
}

/// Default cache directory under the system temp directory.
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join(CACHE_DIR_NAME)
}

/// Contents of a cache file and the metadata of the version that was read.
fn read_entry_file(path: &Path) -> std::io::Result<(String, Metadata)> {
    let mut file = File::open(path)?;
    let seen = file.metadata()?;
    let mut raw = String::new();
    file.read_to_string(&mut raw)?;
    Ok((raw, seen))
}

fn same_version(a: &Metadata, b: &Metadata) -> bool {
    a.len() == b.len() && a.modified().ok() == b.modified().ok()
}

fn epoch_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str = "https://www.metal-archives.com/bands/_/125";

    #[test]
    fn test_key_is_stable_sha256_hex() {
        let a = CacheStore::key_for(URL);
        let b = CacheStore::key_for(URL);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, CacheStore::key_for("https://www.metal-archives.com/bands/_/126"));
    }

    #[test]
    fn test_key_known_digest() {
        assert_eq!(
            CacheStore::key_for(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);

        cache.write(URL, "<html>Metallica</html>").unwrap();

        assert_eq!(cache.read(URL).as_deref(), Some("<html>Metallica</html>"));
        // Fresh entries stay readable
        assert_eq!(cache.read(URL).as_deref(), Some("<html>Metallica</html>"));
    }

    #[test]
    fn test_read_missing_is_absent() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path().join("not-created-yet"), DEFAULT_CACHE_TTL);
        assert!(cache.read(URL).is_none());
    }

    #[test]
    fn test_stale_entry_is_absent_and_removed() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);

        let entry = CacheEntry {
            timestamp: epoch_seconds() - 301.0,
            content: "old".to_string(),
        };
        cache.write_entry(URL, &entry).unwrap();
        assert!(cache.entry_path(URL).exists());

        assert!(cache.read(URL).is_none());
        assert!(!cache.entry_path(URL).exists());
    }

    #[test]
    fn test_entry_within_ttl_is_fresh() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);

        let entry = CacheEntry {
            timestamp: epoch_seconds() - 200.0,
            content: "recent".to_string(),
        };
        cache.write_entry(URL, &entry).unwrap();
        assert_eq!(cache.read(URL).as_deref(), Some("recent"));
    }

    #[test]
    fn test_corrupt_entry_is_absent_and_removed() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);

        fs::write(cache.entry_path(URL), "{not json").unwrap();

        assert!(cache.read(URL).is_none());
        assert!(!cache.entry_path(URL).exists());
    }

    #[test]
    fn test_entry_file_format() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);
        cache.write(URL, "body").unwrap();

        let raw = fs::read_to_string(cache.entry_path(URL)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["content"], "body");
        assert!(value["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_overwrite_leaves_single_file() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);
        cache.write(URL, "first").unwrap();
        cache.write(URL, "second").unwrap();

        assert_eq!(cache.read(URL).as_deref(), Some("second"));
        let files = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_concurrent_reads_see_whole_entries() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);
        let body = "x".repeat(64 * 1024);
        cache.write(URL, &body).unwrap();

        std::thread::scope(|s| {
            let writer = s.spawn(|| {
                for _ in 0..20 {
                    cache.write(URL, &body).unwrap();
                }
            });
            for _ in 0..2 {
                s.spawn(|| {
                    for _ in 0..20 {
                        let read = cache.read(URL);
                        assert_eq!(read.as_deref(), Some(body.as_str()));
                    }
                });
            }
            writer.join().unwrap();
        });
    }

    #[test]
    fn test_eviction_keeps_entry_replaced_after_read() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);
        let path = cache.entry_path(URL);

        let stale = CacheEntry {
            timestamp: epoch_seconds() - 301.0,
            content: "old".to_string(),
        };
        cache.write_entry(URL, &stale).unwrap();
        let seen = fs::metadata(&path).unwrap();

        // A writer lands a fresh entry between the staleness check and the removal
        cache.write(URL, "<html>fresh page</html>").unwrap();
        cache.evict(&path, Some(&seen));

        assert_eq!(cache.read(URL).as_deref(), Some("<html>fresh page</html>"));
    }

    #[test]
    fn test_eviction_removes_unchanged_entry() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);
        let path = cache.entry_path(URL);

        cache.write(URL, "body").unwrap();
        let seen = fs::metadata(&path).unwrap();
        cache.evict(&path, Some(&seen));

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_clones_share_flight_table() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);
        let clone = cache.clone();

        let first = cache.join_flight(URL);
        let second = clone.join_flight(URL);
        assert_eq!(cache.in_flight_count(), 1);

        let held = first.lock().await;
        assert!(second.slot.try_lock().is_err());
        drop(held);

        drop(first);
        assert_eq!(clone.in_flight_count(), 1);
        drop(second);
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[test]
    fn test_invalidate() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path(), DEFAULT_CACHE_TTL);
        cache.write(URL, "body").unwrap();
        cache.invalidate(URL);
        assert!(cache.read(URL).is_none());
        // Invalidating again is harmless
        cache.invalidate(URL);
    }
}
