// SPDX-License-Identifier: LGPL-3.0-only
//! Cached metadata records for filesystem entities.
//!
//! A [`FileRecord`] is the single in-memory representation of one
//! filesystem entity. Records are shared (`Arc`) between listings, the
//! shortcuts model and any other observer; only the record's own load
//! machinery mutates the metadata snapshot. External holders react to the
//! `changed`/`destroyed` notifications instead of mutating fields.

use crate::desktop_entry::DesktopEntry;
use crate::error::{LoadError, RenameError};
use crate::filesystem::cache::CacheShared;
use crate::filesystem::location::Location;
use crate::observer::{ObserverId, ObserverList};
use crate::thumbnail;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Display label for the filesystem root.
const ROOT_DISPLAY_NAME: &str = "File System";

const DESKTOP_ENTRY_TYPE: &str = "application/x-desktop";
const DIRECTORY_MARKER_SUFFIX: &str = ".directory";

/// Effective type of a filesystem entity.
///
/// Symbolic links that resolve take the kind of their target (with
/// [`FileInfo::is_symlink`] set); `Symlink` itself marks a broken link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    /// A symbolic link whose target cannot be resolved.
    Symlink,
    /// Sockets, devices, fifos.
    Other,
}

/// Readiness of the cached preview image for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailState {
    /// Not yet checked; downstream regeneration may be needed.
    Unknown,
    /// No thumbnail can be produced for this entity.
    None,
    /// Generation is in progress.
    Loading,
    /// The thumbnail at [`FileRecord::thumbnail_path`] is valid.
    Ready,
}

/// One metadata snapshot, refreshed wholesale by a (re)load.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub kind: FileKind,
    pub size: u64,
    /// Unix permission and type bits.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: Option<SystemTime>,
    pub atime: Option<SystemTime>,
    pub ctime: Option<SystemTime>,
    pub is_symlink: bool,
    pub symlink_target: Option<PathBuf>,
    pub content_type: String,
    /// Cleared for remote locations that are not currently mounted.
    pub is_mounted: bool,
    /// Original path for entries living in the trash.
    pub trash_origin: Option<PathBuf>,
}

impl FileInfo {
    /// The snapshot used for locations that cannot be queried because they
    /// are not mounted. Not an error condition.
    fn unmounted() -> Self {
        FileInfo {
            kind: FileKind::Other,
            size: 0,
            mode: 0,
            uid: 0,
            gid: 0,
            mtime: None,
            atime: None,
            ctime: None,
            is_symlink: false,
            symlink_target: None,
            content_type: "application/octet-stream".to_string(),
            is_mounted: false,
            trash_origin: None,
        }
    }
}

/// Everything a load produces; committed to the record atomically.
struct Snapshot {
    basename: String,
    display_name: String,
    display_override: Option<String>,
    custom_icon: Option<String>,
    info: FileInfo,
    is_thumbnail: bool,
    thumbnail_path: PathBuf,
}

struct RecordState {
    location: Location,
    basename: String,
    display_name: String,
    display_override: Option<String>,
    custom_icon: Option<String>,
    info: FileInfo,
    is_thumbnail: bool,
    thumbnail_path: PathBuf,
    thumb_state: ThumbnailState,
}

/// The canonical in-memory representation of one filesystem entity.
pub struct FileRecord {
    state: Mutex<RecordState>,
    watch_count: AtomicU32,
    destroyed: AtomicBool,
    changed_observers: ObserverList<FileRecord>,
    destroyed_observers: ObserverList<FileRecord>,
    cache: Mutex<Weak<CacheShared>>,
}

impl FileRecord {
    /// Load a fresh record for `location`. Used by the cache only; external
    /// callers go through `FileCache::get_or_create`.
    pub(crate) fn load_new(
        location: Location,
        cancel: Option<&AtomicBool>,
    ) -> Result<Arc<FileRecord>, LoadError> {
        let snapshot = load_snapshot(&location, cancel)?;
        Ok(Arc::new(FileRecord {
            state: Mutex::new(RecordState {
                location,
                basename: snapshot.basename,
                display_name: snapshot.display_name,
                display_override: snapshot.display_override,
                custom_icon: snapshot.custom_icon,
                info: snapshot.info,
                is_thumbnail: snapshot.is_thumbnail,
                thumbnail_path: snapshot.thumbnail_path,
                thumb_state: ThumbnailState::Unknown,
            }),
            watch_count: AtomicU32::new(0),
            destroyed: AtomicBool::new(false),
            changed_observers: ObserverList::new(),
            destroyed_observers: ObserverList::new(),
            cache: Mutex::new(Weak::new()),
        }))
    }

    pub(crate) fn attach_cache(&self, cache: Weak<CacheShared>) {
        *self.cache.lock().unwrap() = cache;
    }

    /// Re-fetch the metadata snapshot from the backing store.
    ///
    /// On success the snapshot is replaced in place (the identity never
    /// changes) and `changed` is emitted. On failure the previous good
    /// state is untouched and the caller must treat the record as dead:
    /// trigger [`FileRecord::destroy`], never keep it as "stale but alive".
    pub fn reload(&self, cancel: Option<&AtomicBool>) -> Result<(), LoadError> {
        let location = self.location();
        let snapshot = load_snapshot(&location, cancel)?;
        {
            let mut state = self.state.lock().unwrap();
            state.basename = snapshot.basename;
            state.display_name = snapshot.display_name;
            state.display_override = snapshot.display_override;
            state.custom_icon = snapshot.custom_icon;
            state.info = snapshot.info;
            state.is_thumbnail = snapshot.is_thumbnail;
            state.thumbnail_path = snapshot.thumbnail_path;
            state.thumb_state = ThumbnailState::Unknown;
        }
        self.emit_changed();
        Ok(())
    }

    /// Broadcast the destroy notification and drop the cache entry, so
    /// dependent structures detach and a later lookup loads fresh.
    ///
    /// Idempotent; only the first call notifies.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.destroyed_observers.emit(self);
        self.remove_cache_entry();
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn remove_cache_entry(&self) {
        let cache = self.cache.lock().unwrap().upgrade();
        if let Some(cache) = cache {
            let location = self.state.lock().unwrap().location.clone();
            cache.remove_if(&location, self as *const FileRecord);
        }
    }

    // --- observers -------------------------------------------------------

    pub fn on_changed<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&FileRecord) + Send + Sync + 'static,
    {
        self.changed_observers.subscribe(callback)
    }

    pub fn on_destroyed<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&FileRecord) + Send + Sync + 'static,
    {
        self.destroyed_observers.subscribe(callback)
    }

    pub fn unsubscribe_changed(&self, id: ObserverId) -> bool {
        self.changed_observers.unsubscribe(id)
    }

    pub fn unsubscribe_destroyed(&self, id: ObserverId) -> bool {
        self.destroyed_observers.unsubscribe(id)
    }

    fn emit_changed(&self) {
        self.changed_observers.emit(self);
    }

    // --- watch refcounting -----------------------------------------------

    /// Increment the watch reference count, returning the new count.
    /// The OS-level watch is installed by the monitor on the 0 -> 1
    /// transition only.
    pub(crate) fn watch_ref(&self) -> u32 {
        self.watch_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrement the watch reference count, returning the new count.
    /// The OS-level watch is cancelled on the 1 -> 0 transition only.
    pub(crate) fn watch_unref(&self) -> u32 {
        let previous = self.watch_count.fetch_sub(1, Ordering::SeqCst);
        if previous == 0 {
            log::error!("unbalanced watch_unref for {}", self.location());
            self.watch_count.store(0, Ordering::SeqCst);
            return 0;
        }
        previous - 1
    }

    pub fn watch_count(&self) -> u32 {
        self.watch_count.load(Ordering::SeqCst)
    }

    // --- accessors ---------------------------------------------------------

    pub fn location(&self) -> Location {
        self.state.lock().unwrap().location.clone()
    }

    pub fn uri(&self) -> String {
        self.state.lock().unwrap().location.uri()
    }

    pub fn basename(&self) -> String {
        self.state.lock().unwrap().basename.clone()
    }

    pub fn display_name(&self) -> String {
        self.state.lock().unwrap().display_name.clone()
    }

    /// A copy of the current metadata snapshot.
    pub fn info(&self) -> FileInfo {
        self.state.lock().unwrap().info.clone()
    }

    pub fn kind(&self) -> FileKind {
        self.state.lock().unwrap().info.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind() == FileKind::Directory
    }

    pub fn is_mounted(&self) -> bool {
        self.state.lock().unwrap().info.is_mounted
    }

    /// Dotfiles and editor backups (`name~`) count as hidden.
    pub fn is_hidden_file(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.basename.starts_with('.') || state.basename.ends_with('~')
    }

    pub fn size(&self) -> u64 {
        self.state.lock().unwrap().info.size
    }

    pub fn mode(&self) -> u32 {
        self.state.lock().unwrap().info.mode
    }

    /// Whether the mode grants the owner the write bit.
    pub fn is_writable(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.info.is_mounted && (state.info.mode & 0o200) != 0
    }

    pub fn content_type(&self) -> String {
        self.state.lock().unwrap().info.content_type.clone()
    }

    pub fn mtime(&self) -> Option<SystemTime> {
        self.state.lock().unwrap().info.mtime
    }

    pub fn custom_icon(&self) -> Option<String> {
        self.state.lock().unwrap().custom_icon.clone()
    }

    /// Whether this record is itself a cached thumbnail image.
    pub fn is_thumbnail(&self) -> bool {
        self.state.lock().unwrap().is_thumbnail
    }

    /// The deterministic, content-addressed path of this record's cached
    /// preview image (derived from the md5 digest of the canonical URI).
    pub fn thumbnail_path(&self) -> PathBuf {
        self.state.lock().unwrap().thumbnail_path.clone()
    }

    pub fn thumb_state(&self) -> ThumbnailState {
        self.state.lock().unwrap().thumb_state
    }

    /// Record thumbnail readiness reported by the thumbnail subsystem.
    /// Emits `changed` when the state actually changes.
    pub fn set_thumb_state(&self, thumb_state: ThumbnailState) {
        {
            let mut state = self.state.lock().unwrap();
            if state.thumb_state == thumb_state {
                return;
            }
            state.thumb_state = thumb_state;
        }
        self.emit_changed();
    }

    pub fn is_trashed(&self) -> bool {
        self.state.lock().unwrap().info.trash_origin.is_some()
    }

    pub fn trash_origin(&self) -> Option<PathBuf> {
        self.state.lock().unwrap().info.trash_origin.clone()
    }

    pub fn is_desktop_entry(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.info.content_type == DESKTOP_ENTRY_TYPE
            && !state.basename.ends_with(DIRECTORY_MARKER_SUFFIX)
    }

    /// Emblem icon names shown next to this record's icon.
    pub fn emblem_names(&self) -> Vec<&'static str> {
        let state = self.state.lock().unwrap();
        let mut emblems = Vec::new();
        if state.info.is_symlink {
            emblems.push("emblem-symbolic-link");
        }
        if state.info.is_mounted && (state.info.mode & 0o400) == 0 {
            emblems.push("emblem-unreadable");
        }
        emblems
    }

    // --- rename ------------------------------------------------------------

    /// Rename the backing entity.
    ///
    /// Desktop entries are renamed by rewriting their `Name` key (the
    /// identity does not change); everything else is renamed within its
    /// parent directory and the cache entry is re-keyed to the new
    /// location. On failure the prior identity and snapshot stay valid.
    pub fn rename(self: &Arc<Self>, new_name: &str) -> Result<(), RenameError> {
        if new_name.is_empty() || new_name.contains('/') || new_name == "." || new_name == ".." {
            return Err(RenameError::InvalidName(new_name.to_string()));
        }

        let (location, is_desktop) = {
            let state = self.state.lock().unwrap();
            let is_desktop = state.info.content_type == DESKTOP_ENTRY_TYPE
                && !state.basename.ends_with(DIRECTORY_MARKER_SUFFIX);
            (state.location.clone(), is_desktop)
        };
        let path = match location.as_path() {
            Some(path) => path.to_path_buf(),
            None => return Err(RenameError::NotLocal(location)),
        };

        if is_desktop {
            DesktopEntry::write_name(&path, new_name).map_err(|source| {
                RenameError::KeyFileWrite {
                    path: path.clone(),
                    source,
                }
            })?;
            {
                let mut state = self.state.lock().unwrap();
                state.display_override = Some(new_name.to_string());
                state.display_name = new_name.to_string();
            }
            self.emit_changed();
            return Ok(());
        }

        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        let new_path = parent.join(new_name);
        if new_path.symlink_metadata().is_ok() {
            return Err(RenameError::Rename {
                from: path.clone(),
                to: new_path,
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "target exists",
                ),
            });
        }
        std::fs::rename(&path, &new_path).map_err(|source| RenameError::Rename {
            from: path.clone(),
            to: new_path.clone(),
            source,
        })?;

        let new_location = Location::Path(new_path);
        {
            let mut state = self.state.lock().unwrap();
            state.location = new_location.clone();
            state.basename = new_name.to_string();
            if state.display_override.is_none() {
                state.display_name = new_name.to_string();
            }
            state.thumbnail_path = thumbnail::thumbnail_path_for_uri(&new_location.uri());
            state.thumb_state = ThumbnailState::Unknown;
        }
        if let Some(cache) = self.cache.lock().unwrap().upgrade() {
            cache.rekey(&location, new_location, self);
        }
        self.emit_changed();
        Ok(())
    }
}

impl Drop for FileRecord {
    fn drop(&mut self) {
        // Removes the weak table entry exactly once; the pointer guard in
        // the cache makes this a no-op for records that lost an insert
        // race or were already removed by destroy().
        self.remove_cache_entry();
    }
}

impl std::fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("FileRecord")
            .field("location", &state.location)
            .field("display_name", &state.display_name)
            .field("kind", &state.info.kind)
            .finish()
    }
}

fn check_cancelled(location: &Location, cancel: Option<&AtomicBool>) -> Result<(), LoadError> {
    if let Some(flag) = cancel {
        if flag.load(Ordering::Relaxed) {
            return Err(LoadError::Cancelled {
                location: location.clone(),
            });
        }
    }
    Ok(())
}

/// Produce a complete snapshot for `location`, in the documented order:
/// metadata query, basename, thumbnail-cache detection, desktop-entry
/// parsing, display-name resolution, thumbnail path derivation.
fn load_snapshot(
    location: &Location,
    cancel: Option<&AtomicBool>,
) -> Result<Snapshot, LoadError> {
    check_cancelled(location, cancel)?;

    let info = match location {
        // A location without a mounted backing store is not a failure.
        Location::Remote(_) => FileInfo::unmounted(),
        Location::Path(path) => query_path_info(location, path)?,
    };

    check_cancelled(location, cancel)?;

    let basename = location.basename();

    let mut is_thumbnail = false;
    let mut custom_icon = None;
    if let Some(path) = location.as_path() {
        if thumbnail::is_in_cache_dir(path) {
            is_thumbnail = true;
            custom_icon = Some(path.to_string_lossy().into_owned());
        }
    }

    let mut display_override = None;
    if info.content_type == DESKTOP_ENTRY_TYPE && !basename.ends_with(DIRECTORY_MARKER_SUFFIX) {
        if let Some(path) = location.as_path() {
            match DesktopEntry::load(path) {
                Ok(entry) => {
                    if entry.icon.is_some() {
                        custom_icon = entry.icon;
                    }
                    display_override = entry.name;
                }
                Err(err) => {
                    log::debug!("unreadable desktop entry {:?}: {}", path, err);
                }
            }
        }
    }

    let display_name = match &display_override {
        Some(name) => name.clone(),
        None if location.is_root() => ROOT_DISPLAY_NAME.to_string(),
        None if !basename.is_empty() => basename.clone(),
        None => location.to_string(),
    };

    let uri = location.uri();
    let thumbnail_path = thumbnail::thumbnail_path_for_uri(&uri);

    Ok(Snapshot {
        basename,
        display_name,
        display_override,
        custom_icon,
        info,
        is_thumbnail,
        thumbnail_path,
    })
}

fn query_path_info(location: &Location, path: &Path) -> Result<FileInfo, LoadError> {
    let link_meta =
        std::fs::symlink_metadata(path).map_err(|err| LoadError::from_io(location, err))?;

    let is_symlink = link_meta.file_type().is_symlink();
    let symlink_target = if is_symlink {
        std::fs::read_link(path).ok()
    } else {
        None
    };

    // Resolved symlinks take their target's metadata; a broken link keeps
    // its own and is reported as FileKind::Symlink.
    let (meta, kind) = if is_symlink {
        match std::fs::metadata(path) {
            Ok(target_meta) => {
                let kind = kind_of(&target_meta);
                (target_meta, kind)
            }
            Err(_) => (link_meta.clone(), FileKind::Symlink),
        }
    } else {
        let kind = kind_of(&link_meta);
        (link_meta.clone(), kind)
    };

    let content_type = content_type_for(path, kind);
    let trash_origin = trash_origin_for(path);

    Ok(FileInfo {
        kind,
        size: meta.len(),
        mode: meta.mode(),
        uid: meta.uid(),
        gid: meta.gid(),
        mtime: system_time_from_secs(meta.mtime()),
        atime: system_time_from_secs(meta.atime()),
        ctime: system_time_from_secs(meta.ctime()),
        is_symlink,
        symlink_target,
        content_type,
        is_mounted: true,
        trash_origin,
    })
}

fn kind_of(meta: &std::fs::Metadata) -> FileKind {
    let file_type = meta.file_type();
    if file_type.is_dir() {
        FileKind::Directory
    } else if file_type.is_file() {
        FileKind::Regular
    } else {
        FileKind::Other
    }
}

fn content_type_for(path: &Path, kind: FileKind) -> String {
    match kind {
        FileKind::Directory => "inode/directory".to_string(),
        FileKind::Symlink => "inode/symlink".to_string(),
        _ => {
            if path.extension().and_then(|e| e.to_str()) == Some("desktop") {
                return DESKTOP_ENTRY_TYPE.to_string();
            }
            mime_guess2::from_path(path)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string()
        }
    }
}

/// For direct children of the trash directory, recover the original path
/// from the matching `.trashinfo` file.
fn trash_origin_for(path: &Path) -> Option<PathBuf> {
    let data_dir = dirs::data_dir()?;
    let files_dir = data_dir.join("Trash").join("files");
    if path.parent() != Some(files_dir.as_path()) {
        return None;
    }
    let name = path.file_name()?.to_str()?;
    let info_path = data_dir
        .join("Trash")
        .join("info")
        .join(format!("{}.trashinfo", name));
    let content = std::fs::read_to_string(info_path).ok()?;
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("Path=") {
            let decoded = urlencoding::decode(value)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| value.to_string());
            return Some(PathBuf::from(decoded));
        }
    }
    None
}

fn system_time_from_secs(secs: i64) -> Option<SystemTime> {
    if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::from_secs(secs as u64))
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_secs(secs.unsigned_abs()))
    }
}
