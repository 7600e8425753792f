// SPDX-License-Identifier: LGPL-3.0-only
pub mod bookmarks;
pub mod desktop_entry;
pub mod error;
pub mod filesystem;
pub mod jobs;
pub mod listing;
pub mod observer;
pub mod settings;
pub mod shortcuts;
pub mod thumbnail;

// Re-export the types most callers reach for.
pub use bookmarks::{Bookmark, BookmarksFile};
pub use error::{BookmarksError, LoadError, MonitorError, RenameError};
pub use filesystem::{ChangeKind, FileCache, FileInfo, FileKind, FileMonitor, FileRecord, Location, ThumbnailState};
pub use jobs::{JobHandle, JobKind, JobLauncher};
pub use listing::sort::{SortColumn, SortSettings};
pub use listing::{ListingModel, RowEvent};
pub use settings::{Settings, SettingsStore};
pub use shortcuts::{Device, Shortcut, ShortcutGroup, ShortcutTarget, ShortcutsModel};
