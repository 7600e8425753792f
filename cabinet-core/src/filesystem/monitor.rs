// SPDX-License-Identifier: LGPL-3.0-only
//! Filesystem change monitoring for cached records.
//!
//! The monitor owns one OS-level watcher and a set of watched paths.
//! Records are watched by reference count: many holders may ask to watch
//! the same record, but the OS watch is installed on the 0 -> 1 transition
//! and cancelled on the 1 -> 0 transition only.
//!
//! Events are polled and dispatched against a [`FileCache`]: every event
//! reloads the affected record, and a reload whose backing store is gone
//! destroys it. Creations and removals also refresh the cached record of
//! the containing directory.

use crate::error::MonitorError;
use crate::filesystem::cache::FileCache;
use crate::filesystem::location::Location;
use crate::filesystem::record::FileRecord;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

/// A change reported against one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A new entity appeared.
    Created,
    /// The entity's contents changed.
    Changed,
    /// Only metadata (permissions, timestamps, ownership) changed.
    AttributeChanged,
    /// The entity is gone.
    Removed,
    /// The entity's backing mount is about to go away.
    PreUnmount,
}

/// Watches local paths on behalf of cached records.
pub struct FileMonitor {
    watcher: RecommendedWatcher,
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    /// The path each OS watch was installed under, keyed by record
    /// identity. A record may be renamed while watched; cancellation must
    /// use the install path, not the record's current location.
    watched: HashMap<usize, PathBuf>,
}

fn record_key(record: &Arc<FileRecord>) -> usize {
    Arc::as_ptr(record) as usize
}

impl FileMonitor {
    pub fn new() -> Result<Self, MonitorError> {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(tx)?;

        Ok(Self {
            watcher,
            event_rx: rx,
            watched: HashMap::new(),
        })
    }

    /// Register interest in changes to `record`.
    ///
    /// Increments the record's watch count; the OS watch is installed only
    /// when this is the first interested party.
    pub fn watch(&mut self, record: &Arc<FileRecord>) -> Result<(), MonitorError> {
        let location = record.location();
        let path = match location.as_path() {
            Some(path) => path.to_path_buf(),
            None => return Err(MonitorError::NotLocal(location)),
        };

        if record.watch_ref() == 1 {
            if let Err(err) = self.watcher.watch(&path, RecursiveMode::NonRecursive) {
                record.watch_unref();
                return Err(err.into());
            }
            self.watched.insert(record_key(record), path);
        }
        Ok(())
    }

    /// Drop one registration for `record`, cancelling the OS watch when the
    /// last one goes away.
    pub fn unwatch(&mut self, record: &Arc<FileRecord>) {
        if record.watch_unref() != 0 {
            return;
        }
        if let Some(path) = self.watched.remove(&record_key(record)) {
            // The path may already be gone; a failed unwatch is harmless.
            if let Err(err) = self.watcher.unwatch(&path) {
                log::debug!("unwatch {:?} failed: {}", path, err);
            }
        }
    }

    /// Number of paths with an active OS-level watch.
    pub fn active_watch_count(&self) -> usize {
        self.watched.len()
    }

    /// Drain pending OS events and apply them to `cache`.
    ///
    /// Returns the number of changes applied to cached records.
    pub fn dispatch(&self, cache: &FileCache) -> usize {
        let mut applied = 0;
        while let Ok(result) = self.event_rx.try_recv() {
            let event = match result {
                Ok(event) => event,
                Err(err) => {
                    log::warn!("file watcher error: {}", err);
                    continue;
                }
            };
            for (path, kind) in convert_event(event) {
                applied += apply_change(cache, &Location::from_path(path), kind);
            }
        }
        applied
    }

    /// Inject a change notification, as if the OS had reported it.
    ///
    /// Used by mount handling (pre-unmount broadcasts) and by operations
    /// that know they changed something before the watcher can tell us.
    pub fn notify_change(&self, cache: &FileCache, location: &Location, kind: ChangeKind) {
        apply_change(cache, location, kind);
    }
}

/// Apply one change to the cached record for `location`, if any, and keep
/// the parent directory record in step for appear/disappear events.
fn apply_change(cache: &FileCache, location: &Location, kind: ChangeKind) -> usize {
    let mut applied = 0;

    if let Some(record) = cache.lookup(location) {
        applied += 1;
        // Every kind goes through a reload, removals and pre-unmounts
        // included: a record whose backing store is really gone fails the
        // reload and is destroyed through that path.
        if let Err(err) = record.reload(None) {
            log::debug!("reload after {:?} failed: {}", kind, err);
            record.destroy();
        }
    }

    // Entities appearing or vanishing change their directory too.
    if matches!(kind, ChangeKind::Created | ChangeKind::Removed) {
        if let Some(parent) = location.parent() {
            if let Some(dir_record) = cache.lookup(&parent) {
                applied += 1;
                if let Err(err) = dir_record.reload(None) {
                    log::debug!("reload of parent {} failed: {}", parent, err);
                    dir_record.destroy();
                }
            }
        }
    }

    applied
}

/// Flatten a notify event into per-path changes.
fn convert_event(event: Event) -> Vec<(PathBuf, ChangeKind)> {
    let mut changes = Vec::new();

    match event.kind {
        EventKind::Create(_) => {
            for path in event.paths {
                changes.push((path, ChangeKind::Created));
            }
        }
        EventKind::Modify(kind) => {
            use notify::event::ModifyKind;
            match kind {
                ModifyKind::Name(_) => {
                    // A rename is a removal at the old path and a creation
                    // at the new one; records are keyed by location.
                    if event.paths.len() >= 2 {
                        changes.push((event.paths[0].clone(), ChangeKind::Removed));
                        changes.push((event.paths[1].clone(), ChangeKind::Created));
                    } else if let Some(path) = event.paths.into_iter().next() {
                        changes.push((path, ChangeKind::Changed));
                    }
                }
                ModifyKind::Metadata(_) => {
                    for path in event.paths {
                        changes.push((path, ChangeKind::AttributeChanged));
                    }
                }
                _ => {
                    for path in event.paths {
                        changes.push((path, ChangeKind::Changed));
                    }
                }
            }
        }
        EventKind::Remove(_) => {
            for path in event.paths {
                changes.push((path, ChangeKind::Removed));
            }
        }
        // Access events carry no state we cache.
        EventKind::Access(_) => {}
        EventKind::Other | EventKind::Any => {
            for path in event.paths {
                changes.push((path, ChangeKind::Changed));
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cached_file(cache: &FileCache, dir: &tempfile::TempDir, name: &str) -> Arc<FileRecord> {
        let path = dir.path().join(name);
        std::fs::write(&path, b"x").unwrap();
        cache.get_or_create(&Location::from_path(path), None).unwrap()
    }

    #[test]
    fn watch_refcount_controls_os_watch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let record = cached_file(&cache, &dir, "watched.txt");
        let mut monitor = FileMonitor::new().unwrap();

        monitor.watch(&record).unwrap();
        monitor.watch(&record).unwrap();
        assert_eq!(record.watch_count(), 2);
        assert_eq!(monitor.active_watch_count(), 1);

        monitor.unwatch(&record);
        assert_eq!(monitor.active_watch_count(), 1);
        monitor.unwatch(&record);
        assert_eq!(monitor.active_watch_count(), 0);
        assert_eq!(record.watch_count(), 0);
    }

    #[test]
    fn renamed_record_still_cancels_its_watch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let record = cached_file(&cache, &dir, "before.txt");
        let mut monitor = FileMonitor::new().unwrap();

        monitor.watch(&record).unwrap();
        record.rename("after.txt").unwrap();

        monitor.unwatch(&record);
        assert_eq!(monitor.active_watch_count(), 0);
        assert_eq!(record.watch_count(), 0);
    }

    #[test]
    fn watching_remote_records_fails() {
        let cache = FileCache::new();
        let record = cache
            .get_or_create(&Location::from_uri("sftp://host/share"), None)
            .unwrap();
        let mut monitor = FileMonitor::new().unwrap();

        assert!(matches!(
            monitor.watch(&record),
            Err(MonitorError::NotLocal(_))
        ));
        assert_eq!(record.watch_count(), 0);
    }

    #[test]
    fn injected_change_reloads_record() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let record = cached_file(&cache, &dir, "a.txt");
        let monitor = FileMonitor::new().unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        record.on_changed(move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        std::fs::write(dir.path().join("a.txt"), b"longer contents").unwrap();
        monitor.notify_change(&cache, &record.location(), ChangeKind::Changed);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(record.size(), 15);
    }

    #[test]
    fn removal_destroys_record_once_backing_store_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let record = cached_file(&cache, &dir, "b.txt");
        let monitor = FileMonitor::new().unwrap();

        std::fs::remove_file(dir.path().join("b.txt")).unwrap();
        monitor.notify_change(&cache, &record.location(), ChangeKind::Removed);
        assert!(record.is_destroyed());
        assert!(cache.lookup(&record.location()).is_none());
    }

    #[test]
    fn pre_unmount_with_live_backing_store_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let record = cached_file(&cache, &dir, "still-here.txt");
        let monitor = FileMonitor::new().unwrap();

        monitor.notify_change(&cache, &record.location(), ChangeKind::PreUnmount);
        assert!(!record.is_destroyed());
    }

    #[test]
    fn change_that_fails_to_reload_destroys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let record = cached_file(&cache, &dir, "c.txt");
        let monitor = FileMonitor::new().unwrap();

        std::fs::remove_file(dir.path().join("c.txt")).unwrap();
        monitor.notify_change(&cache, &record.location(), ChangeKind::Changed);
        assert!(record.is_destroyed());
    }

    #[test]
    fn creation_refreshes_cached_parent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let dir_loc = Location::from_path(dir.path());
        let dir_record = cache.get_or_create(&dir_loc, None).unwrap();
        let monitor = FileMonitor::new().unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        dir_record.on_changed(move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        let child = dir.path().join("new_child");
        std::fs::write(&child, b"").unwrap();
        monitor.notify_change(&cache, &Location::from_path(child), ChangeKind::Created);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn os_events_reach_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let record = cached_file(&cache, &dir, "live.txt");
        let mut monitor = FileMonitor::new().unwrap();

        monitor.watch(&record).unwrap();
        std::fs::write(dir.path().join("live.txt"), b"changed!").unwrap();

        // Inotify delivery is asynchronous; poll with a deadline.
        let mut applied = 0;
        for _ in 0..50 {
            applied += monitor.dispatch(&cache);
            if applied > 0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(applied > 0);
        assert_eq!(record.size(), 8);
    }
}
