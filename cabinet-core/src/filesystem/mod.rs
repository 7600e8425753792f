// SPDX-License-Identifier: LGPL-3.0-only
//! Filesystem entity cache: locations, records, the weak cache and the
//! change monitor.

pub mod cache;
pub mod location;
pub mod monitor;
pub mod record;

pub use cache::FileCache;
pub use location::Location;
pub use monitor::{ChangeKind, FileMonitor};
pub use record::{FileInfo, FileKind, FileRecord, ThumbnailState};
