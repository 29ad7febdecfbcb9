use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CircleError, Result};

/// Key-value store backing the cache manager.
///
/// A `ttl` of `None` keeps the entry until it is evicted; a zero `ttl` means the
/// value must not be stored at all. Implementations never fail: a storage problem
/// degrades to a miss or a dropped write.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Writes pending changes to backing storage.
    fn flush(&self) {}
}

/// Cache used with `--no-cache`: every lookup misses and writes are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl Cache for NullCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value, _ttl: Option<Duration>) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
    size: u64,
    last_access: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheState {
    /// Monotonic access counter used for least-recently-used ordering.
    clock: u64,
    entries: HashMap<String, CacheEntry>,
    #[serde(skip)]
    dirty: bool,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn volume(&self) -> u64 {
        self.entries.values().map(|entry| entry.size).sum()
    }

    fn remove_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    fn evict_to(&mut self, size_limit: u64, now: DateTime<Utc>) {
        if self.volume() <= size_limit {
            return;
        }

        self.remove_expired(now);

        let mut by_access: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_access, key.clone()))
            .collect();
        by_access.sort_unstable();

        let mut volume = self.volume();
        for (_, key) in by_access {
            if volume <= size_limit {
                break;
            }
            if let Some(entry) = self.entries.remove(&key) {
                debug!("Cache evict: {key}");
                volume -= entry.size;
                self.dirty = true;
            }
        }
    }
}

/// Persistent cache for one project.
///
/// Entries live in a single JSON file per project under the platform cache
/// directory:
/// - Linux: `~/.cache/circle-cli/{vcs}-{org}-{repo}.json`
/// - macOS: `~/Library/Caches/circle-cli/{vcs}-{org}-{repo}.json`
///
/// The file is loaded into memory when the cache is opened. Reads and writes
/// only touch memory; the file is rewritten on [`Cache::flush`] or drop when
/// something changed. Total value size is bounded; the least recently used
/// entries are evicted first. Deleting the file at any time is safe.
pub struct DiskCache {
    cache_file: PathBuf,
    size_limit: u64,
    state: Mutex<CacheState>,
}

impl DiskCache {
    /// Opens the cache for `project_slug` in the platform cache directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be determined or created.
    pub fn new(project_slug: &str, size_limit_mb: u64) -> Result<Self> {
        let cache_file = Self::cache_file_for(project_slug)?;
        if let Some(parent) = cache_file.parent() {
            fs::create_dir_all(parent)?;
        }

        info!("Cache enabled at: {}", cache_file.display());

        Ok(Self::open(cache_file, size_limit_mb * 1024 * 1024))
    }

    /// Opens a cache backed by an explicit file with a byte budget.
    pub fn open(cache_file: PathBuf, size_limit: u64) -> Self {
        let state = Self::load(&cache_file);
        Self {
            cache_file,
            size_limit,
            state: Mutex::new(state),
        }
    }

    fn cache_file_for(project_slug: &str) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| CircleError::Cache("No cache directory found".into()))?
            .join("circle-cli");

        // "gh/org/repo" -> "gh-org-repo.json"
        let cache_filename = project_slug.replace('/', "-") + ".json";
        Ok(cache_dir.join(cache_filename))
    }

    fn load(cache_file: &Path) -> CacheState {
        if !cache_file.exists() {
            return CacheState::default();
        }

        fs::read_to_string(cache_file)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .inspect(|_| debug!("Loaded cache from: {}", cache_file.display()))
            .unwrap_or_else(|| {
                warn!("Failed to load cache, starting with empty cache");
                CacheState::default()
            })
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(cache_file: &Path, state: &mut CacheState) {
        match Self::write_atomically(cache_file, state) {
            Ok(()) => state.dirty = false,
            Err(e) => warn!("Failed to write cache {}: {e}", cache_file.display()),
        }
    }

    fn write_atomically(cache_file: &Path, state: &CacheState) -> Result<()> {
        let content = serde_json::to_string(state)?;
        let tmp_file = cache_file.with_extension("json.tmp");
        fs::write(&tmp_file, content)?;
        fs::rename(&tmp_file, cache_file)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.cache_file
    }

    /// Total size in bytes of all stored values.
    pub fn size(&self) -> u64 {
        self.lock().volume()
    }

    /// Drops expired entries and returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut state = self.lock();
        let removed = state.remove_expired(Utc::now());
        if state.dirty {
            Self::persist(&self.cache_file, &mut state);
        }
        info!("Pruned {removed} expired cache entries");
        removed
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.dirty = true;
        Self::persist(&self.cache_file, &mut state);
        info!("Cache cleared: {}", self.cache_file.display());
    }
}

impl Cache for DiskCache {
    fn get(&self, key: &str) -> Option<Value> {
        let now = Utc::now();
        let mut guard = self.lock();
        let state = &mut *guard;

        let expired = state.entries.get(key).map(|entry| entry.is_expired(now));
        if expired == Some(true) {
            state.entries.remove(key);
            state.dirty = true;
        }

        let stamp = state.tick();
        match state.entries.get_mut(key) {
            Some(entry) => {
                debug!("Cache hit: {key}");
                entry.last_access = stamp;
                state.dirty = true;
                Some(entry.value.clone())
            }
            None => {
                debug!("Cache miss: {key}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        if ttl == Some(Duration::ZERO) {
            return;
        }

        let now = Utc::now();
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| now.checked_add_signed(ttl));

        let size = match serde_json::to_vec(&value) {
            Ok(bytes) => bytes.len() as u64,
            Err(e) => {
                warn!("Skipping cache write for {key}: {e}");
                return;
            }
        };

        let mut state = self.lock();
        let last_access = state.tick();
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at,
                size,
                last_access,
            },
        );
        state.dirty = true;
        state.evict_to(self.size_limit, now);
    }

    fn flush(&self) {
        let mut state = self.lock();
        if state.dirty {
            debug!("Flushing cache to: {}", self.cache_file.display());
            Self::persist(&self.cache_file, &mut state);
        }
    }
}

impl Drop for DiskCache {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.dirty {
            Self::persist(&self.cache_file, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const UNLIMITED: u64 = u64::MAX;

    fn open_cache(dir: &TempDir, size_limit: u64) -> DiskCache {
        DiskCache::open(dir.path().join("gh-org-repo.json"), size_limit)
    }

    #[test]
    fn test_null_cache_always_misses() {
        let cache = NullCache;
        cache.set("key", json!("value"), None);
        assert!(cache.get("key").is_none());
    }

    #[test]
    fn test_roundtrip_without_ttl() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir, UNLIMITED);

        assert!(cache.get("workflow:wf-1").is_none());
        cache.set("workflow:wf-1", json!({"id": "wf-1"}), None);
        assert_eq!(cache.get("workflow:wf-1"), Some(json!({"id": "wf-1"})));
    }

    #[test]
    fn test_roundtrip_with_positive_ttl() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir, UNLIMITED);

        cache.set(
            "pipeline:pipe-1",
            json!([1, 2, 3]),
            Some(Duration::from_secs(60)),
        );
        assert_eq!(cache.get("pipeline:pipe-1"), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_zero_ttl_is_not_stored() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir, UNLIMITED);

        cache.set("key", json!("value"), Some(Duration::ZERO));
        assert!(cache.get("key").is_none());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir, UNLIMITED);

        cache.set("key", json!("value"), Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("key").is_none());
    }

    #[test]
    fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = open_cache(&temp_dir, UNLIMITED);
            cache.set("job_tests:42", json!([{"name": "test_one"}]), None);
        }

        let reopened = open_cache(&temp_dir, UNLIMITED);
        assert_eq!(
            reopened.get("job_tests:42"),
            Some(json!([{"name": "test_one"}]))
        );
    }

    #[test]
    fn test_least_recently_used_entry_is_evicted() {
        let temp_dir = TempDir::new().unwrap();
        // Each value below serializes to 12 bytes; two fit, three do not.
        let cache = open_cache(&temp_dir, 30);

        cache.set("a", json!("aaaaaaaaaa"), None);
        cache.set("b", json!("bbbbbbbbbb"), None);
        assert!(cache.get("a").is_some());
        cache.set("c", json!("cccccccccc"), None);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.size(), 24);
    }

    #[test]
    fn test_prune_removes_only_expired_entries() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir, UNLIMITED);

        cache.set("short", json!(1), Some(Duration::from_millis(1)));
        cache.set("long", json!(2), None);
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.prune(), 1);
        assert_eq!(cache.get("long"), Some(json!(2)));
    }

    #[test]
    fn test_clear_removes_everything() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir, UNLIMITED);

        cache.set("a", json!(1), None);
        cache.set("b", json!(2), None);
        cache.clear();

        assert_eq!(cache.size(), 0);
        let reopened = open_cache(&temp_dir, UNLIMITED);
        assert!(reopened.get("a").is_none());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("gh-org-repo.json"), "not json").unwrap();

        let cache = open_cache(&temp_dir, UNLIMITED);
        assert!(cache.get("anything").is_none());

        cache.set("key", json!("value"), None);
        assert_eq!(cache.get("key"), Some(json!("value")));
    }

    #[test]
    fn test_unwritable_location_degrades_to_memory() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::open(
            temp_dir.path().join("missing-dir").join("cache.json"),
            UNLIMITED,
        );

        cache.set("key", json!("value"), None);
        assert_eq!(cache.get("key"), Some(json!("value")));
    }

    #[test]
    fn test_per_project_cache_files() {
        let temp_dir = TempDir::new().unwrap();
        let first = DiskCache::open(temp_dir.path().join("gh-org-one.json"), UNLIMITED);
        let second = DiskCache::open(temp_dir.path().join("gh-org-two.json"), UNLIMITED);

        first.set("pipeline:pipe-1", json!("one"), None);
        second.set("pipeline:pipe-1", json!("two"), None);

        assert_eq!(first.get("pipeline:pipe-1"), Some(json!("one")));
        assert_eq!(second.get("pipeline:pipe-1"), Some(json!("two")));
        first.flush();
        second.flush();
        assert!(temp_dir.path().join("gh-org-one.json").exists());
        assert!(temp_dir.path().join("gh-org-two.json").exists());
    }

    #[test]
    fn test_writes_stay_in_memory_until_flush() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir, UNLIMITED);

        for n in 0..50 {
            cache.set(&format!("workflow:wf-{n}"), json!({"id": n}), None);
        }
        assert!(!cache.path().exists());

        cache.flush();
        assert!(cache.path().exists());

        // Nothing changed since the last flush, so the file is not rewritten.
        fs::remove_file(cache.path()).unwrap();
        cache.flush();
        assert!(!cache.path().exists());

        cache.set("workflow:wf-50", json!({"id": 50}), None);
        cache.flush();
        let reopened = open_cache(&temp_dir, UNLIMITED);
        assert_eq!(reopened.get("workflow:wf-0"), Some(json!({"id": 0})));
        assert_eq!(reopened.get("workflow:wf-50"), Some(json!({"id": 50})));
    }
}
