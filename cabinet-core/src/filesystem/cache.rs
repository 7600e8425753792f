// SPDX-License-Identifier: LGPL-3.0-only
//! The per-process file record cache.
//!
//! One record per location, held weakly: the cache never keeps a record
//! alive by itself. Loading happens outside the table lock, so two threads
//! may race to load the same location; the loser's record is discarded
//! without ever being observable.

use crate::error::LoadError;
use crate::filesystem::location::Location;
use crate::filesystem::record::FileRecord;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, Weak};

/// The table shared between the cache handle and its records.
///
/// Records hold a `Weak` back-reference for self-removal on drop, destroy
/// and rename.
pub(crate) struct CacheShared {
    table: Mutex<HashMap<Location, Weak<FileRecord>>>,
}

impl CacheShared {
    /// Remove the entry for `location`, but only if it still points at the
    /// record identified by `ptr`. Guards against a dropped race loser (or
    /// an already-replaced record) evicting the live entry.
    pub(crate) fn remove_if(&self, location: &Location, ptr: *const FileRecord) {
        let mut table = self.table.lock().unwrap();
        if let Some(weak) = table.get(location) {
            if std::ptr::eq(weak.as_ptr(), ptr) {
                table.remove(location);
            }
        }
    }

    /// Move a record's entry from `old` to `new` after a rename. The same
    /// pointer guard applies: only the entry for this record is moved.
    pub(crate) fn rekey(&self, old: &Location, new: Location, record: &Arc<FileRecord>) {
        let mut table = self.table.lock().unwrap();
        if let Some(weak) = table.get(old) {
            if std::ptr::eq(weak.as_ptr(), Arc::as_ptr(record)) {
                table.remove(old);
            }
        }
        table.insert(new, Arc::downgrade(record));
    }
}

/// Weak-reference cache mapping locations to their live [`FileRecord`]s.
///
/// Handles are cheap to clone and share one table.
#[derive(Clone)]
pub struct FileCache {
    shared: Arc<CacheShared>,
}

impl FileCache {
    pub fn new() -> Self {
        FileCache {
            shared: Arc::new(CacheShared {
                table: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Return the live record for `location`, loading one if needed.
    ///
    /// Two callers asking for the same location get the same `Arc`. The
    /// metadata load runs without the table lock held; if another thread
    /// inserted a record for the same location in the meantime, that record
    /// wins and the freshly loaded one is silently dropped.
    pub fn get_or_create(
        &self,
        location: &Location,
        cancel: Option<&AtomicBool>,
    ) -> Result<Arc<FileRecord>, LoadError> {
        if let Some(record) = self.lookup(location) {
            return Ok(record);
        }

        let record = FileRecord::load_new(location.clone(), cancel)?;

        let mut table = self.shared.table.lock().unwrap();
        if let Some(existing) = table.get(location).and_then(Weak::upgrade) {
            // Lost the insert race; `record` is dropped without observers.
            return Ok(existing);
        }
        table.insert(location.clone(), Arc::downgrade(&record));
        drop(table);

        record.attach_cache(Arc::downgrade(&self.shared));
        Ok(record)
    }

    /// Return the cached record for `location` without loading.
    pub fn lookup(&self, location: &Location) -> Option<Arc<FileRecord>> {
        self.shared
            .table
            .lock()
            .unwrap()
            .get(location)
            .and_then(Weak::upgrade)
    }

    /// Number of live entries (dead weak entries are pruned on the way).
    pub fn len(&self) -> usize {
        let mut table = self.shared.table.lock().unwrap();
        table.retain(|_, weak| weak.strong_count() > 0);
        table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_file(dir: &tempfile::TempDir, name: &str) -> Location {
        let path = dir.path().join(name);
        std::fs::write(&path, b"x").unwrap();
        Location::from_path(path)
    }

    #[test]
    fn same_location_yields_same_record() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let loc = tmp_file(&dir, "a.txt");

        let first = cache.get_or_create(&loc, None).unwrap();
        let second = cache.get_or_create(&loc, None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn dropping_all_holders_empties_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let loc = tmp_file(&dir, "b.txt");

        let record = cache.get_or_create(&loc, None).unwrap();
        assert_eq!(cache.len(), 1);
        drop(record);
        assert!(cache.lookup(&loc).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn relookup_after_drop_loads_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let loc = tmp_file(&dir, "c.txt");

        let first = cache.get_or_create(&loc, None).unwrap();
        assert_eq!(first.size(), 1);
        drop(first);

        // A stale record would still report the old metadata.
        std::fs::write(dir.path().join("c.txt"), b"regrown").unwrap();
        let second = cache.get_or_create(&loc, None).unwrap();
        assert_eq!(second.size(), 7);
    }

    #[test]
    fn destroy_removes_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let loc = tmp_file(&dir, "d.txt");

        let record = cache.get_or_create(&loc, None).unwrap();
        record.destroy();
        assert!(cache.lookup(&loc).is_none());

        // The record object itself is still safe to use.
        assert!(record.is_destroyed());
        assert_eq!(record.basename(), "d.txt");
    }

    #[test]
    fn rename_rekeys_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let loc = tmp_file(&dir, "before.txt");

        let record = cache.get_or_create(&loc, None).unwrap();
        record.rename("after.txt").unwrap();

        assert!(cache.lookup(&loc).is_none());
        let new_loc = Location::from_path(dir.path().join("after.txt"));
        let looked_up = cache.lookup(&new_loc).unwrap();
        assert!(Arc::ptr_eq(&record, &looked_up));
    }

    #[test]
    fn load_failure_caches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let loc = Location::from_path(dir.path().join("missing"));

        assert!(cache.get_or_create(&loc, None).is_err());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn caches_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let loc = tmp_file(&dir, "e.txt");

        let cache_a = FileCache::new();
        let cache_b = FileCache::new();
        let a = cache_a.get_or_create(&loc, None).unwrap();
        let b = cache_b.get_or_create(&loc, None).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
