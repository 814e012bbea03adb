//! Purpose: Keep at most one opened, metadata-parsed handle per file path.
//! Exports: `ReaderCache`, `CacheOptions`, `CacheStats`.
//! Role: Owned by the host and injected into `api::TableReader`; the ABI keeps one process-wide instance.
//! Invariants: Concurrent acquires of one path observe the same handle until it is invalidated.
//! Invariants: The map lock covers lookup/insert/remove only; open+parse runs under a per-path slot lock.
//! Invariants: A failed open drops its slot unless another acquirer already holds that slot.
//! Invariants: Invalidation affects future acquires; handles already handed out stay valid.
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::handle::FileHandle;

pub const DEFAULT_BATCH_SIZE: usize = 65_536;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CacheOptions {
    /// Rows per decoded batch inside one physical read.
    pub batch_size: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheStats {
    pub opens: u64,
    pub hits: u64,
    pub invalidations: u64,
    pub cached: usize,
}

type Slot = Arc<Mutex<Option<Arc<FileHandle>>>>;

#[derive(Debug, Default)]
pub struct ReaderCache {
    options: CacheOptions,
    slots: Mutex<HashMap<PathBuf, Slot>>,
    opens: AtomicU64,
    hits: AtomicU64,
    invalidations: AtomicU64,
}

impl ReaderCache {
    pub fn new() -> Self {
        Self::with_options(CacheOptions::default())
    }

    pub fn with_options(options: CacheOptions) -> Self {
        Self {
            options,
            slots: Mutex::new(HashMap::new()),
            opens: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    pub fn acquire(&self, path: impl AsRef<Path>) -> Result<Arc<FileHandle>, Error> {
        let key = normalize_path(path.as_ref())?;
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut cell = lock(&slot);
        if let Some(handle) = cell.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(path = %key.display(), "reader cache hit");
            return Ok(Arc::clone(handle));
        }

        debug!(path = %key.display(), "reader cache miss; opening");
        match FileHandle::open(&key, &self.options) {
            Ok(handle) => {
                let handle = Arc::new(handle);
                *cell = Some(Arc::clone(&handle));
                self.opens.fetch_add(1, Ordering::Relaxed);
                Ok(handle)
            }
            Err(err) => {
                drop(cell);
                self.forget_empty_slot(&key, &slot);
                debug!(path = %key.display(), error = %err, "open failed");
                Err(err)
            }
        }
    }

    /// Drops the cached handle for `path`; returns whether one was present.
    pub fn invalidate(&self, path: impl AsRef<Path>) -> bool {
        let Ok(key) = normalize_path(path.as_ref()) else {
            return false;
        };
        let removed = lock(&self.slots).remove(&key).is_some();
        if removed {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!(path = %key.display(), "reader cache invalidated");
        }
        removed
    }

    /// Drops every cached handle; returns how many were removed.
    pub fn invalidate_all(&self) -> usize {
        let removed = {
            let mut slots = lock(&self.slots);
            let count = slots.len();
            slots.clear();
            count
        };
        self.invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        debug!(removed, "reader cache cleared");
        removed
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let Ok(key) = normalize_path(path.as_ref()) else {
            return false;
        };
        let slot = lock(&self.slots).get(&key).cloned();
        slot.is_some_and(|slot| lock(&slot).is_some())
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            opens: self.opens.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            cached: self.len(),
        }
    }

    // Removes `slot` only while it is still mapped and held by nobody but the map and
    // the caller. Slots are cloned only under the map lock, so a count of two means no
    // other acquirer is waiting on it and none can start.
    fn forget_empty_slot(&self, key: &Path, slot: &Slot) {
        let mut slots = lock(&self.slots);
        let Some(current) = slots.get(key) else {
            return;
        };
        if Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2 {
            slots.remove(key);
        }
    }
}

// Cache state stays consistent across a panicking holder: every critical section
// is a single map or slot assignment.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Absolute, lexically normalized form of `path` used as the cache key.
pub fn normalize_path(path: &Path) -> Result<PathBuf, Error> {
    if path.as_os_str().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("path is empty"));
    }
    let absolute = std::path::absolute(path).map_err(|err| {
        Error::from_io(err, path).with_message("failed to resolve absolute path")
    })?;
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{CacheOptions, ReaderCache, Slot, lock, normalize_path};
    use crate::core::error::ErrorKind;
    use crate::core::handle::FileHandle;
    use crate::test_support::write_int_file;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn acquire_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "a.parquet", 10, 5);
        let cache = ReaderCache::new();
        let first = cache.acquire(&path).expect("first");
        let second = cache.acquire(&path).expect("second");
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.opens, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.cached, 1);
    }

    #[test]
    fn equivalent_spellings_share_a_handle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "a.parquet", 10, 5);
        let dotted = dir.path().join(".").join("sub").join("..").join("a.parquet");
        let cache = ReaderCache::new();
        let first = cache.acquire(&path).expect("first");
        let second = cache.acquire(&dotted).expect("second");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().opens, 1);
    }

    #[test]
    fn invalidate_forces_reopen_but_keeps_old_handle_valid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "a.parquet", 10, 5);
        let cache = ReaderCache::new();
        let old = cache.acquire(&path).expect("first");
        assert!(cache.invalidate(&path));
        assert!(!cache.invalidate(&path));
        assert!(!cache.contains(&path));

        let fresh = cache.acquire(&path).expect("reopen");
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert_eq!(old.total_rows(), 10);
        assert_eq!(cache.stats().opens, 2);
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = write_int_file(dir.path(), "a.parquet", 10, 5);
        let b = write_int_file(dir.path(), "b.parquet", 10, 5);
        let cache = ReaderCache::new();
        cache.acquire(&a).expect("a");
        cache.acquire(&b).expect("b");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.invalidate_all(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 2);
    }

    #[test]
    fn failed_open_is_not_retained() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("later.parquet");
        let cache = ReaderCache::new();
        let err = cache.acquire(&missing).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(cache.is_empty());

        write_int_file(dir.path(), "later.parquet", 3, 3);
        let handle = cache.acquire(&missing).expect("now present");
        assert_eq!(handle.total_rows(), 3);
    }

    #[test]
    fn failed_open_keeps_slot_another_acquirer_is_waiting_on() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("racy.parquet");
        let key = normalize_path(&path).expect("key");
        let cache = ReaderCache::new();

        // The failing acquirer and a second one that cloned the slot before the cleanup.
        let failing: Slot = Arc::default();
        lock(&cache.slots).insert(key.clone(), Arc::clone(&failing));
        let waiting = Arc::clone(&failing);
        cache.forget_empty_slot(&key, &failing);
        drop(failing);
        assert_eq!(cache.len(), 1);

        // The waiter opens successfully; later acquires must see its handle.
        write_int_file(dir.path(), "racy.parquet", 4, 2);
        let opened = Arc::new(FileHandle::open(&key, &cache.options).expect("open"));
        *lock(&waiting) = Some(Arc::clone(&opened));
        let seen = cache.acquire(&path).expect("acquire");
        assert!(Arc::ptr_eq(&opened, &seen));
        assert_eq!(cache.stats().hits, 1);

        // With nobody else holding it, a failed slot is dropped.
        let lone: Slot = Arc::default();
        let other = normalize_path(&dir.path().join("gone.parquet")).expect("key");
        lock(&cache.slots).insert(other.clone(), Arc::clone(&lone));
        cache.forget_empty_slot(&other, &lone);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn options_flow_into_handles() {
        let cache = ReaderCache::with_options(CacheOptions { batch_size: 16 });
        assert_eq!(cache.options().batch_size, 16);
    }

    #[test]
    fn normalize_folds_dot_components() {
        let base = Path::new("/data/files");
        let normalized = normalize_path(&base.join("./x/../t.parquet")).expect("normalize");
        assert_eq!(normalized, Path::new("/data/files/t.parquet"));
        let err = normalize_path(Path::new("")).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
