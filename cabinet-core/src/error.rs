// SPDX-License-Identifier: LGPL-3.0-only
//! Error types for the cache, record and bookmarks machinery.

use crate::filesystem::location::Location;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while (re)loading a file record's metadata snapshot.
///
/// A location that merely is not mounted is not an error: the record is
/// created (or kept) with its mounted flag cleared instead.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The backing entity does not exist.
    #[error("no such file or directory: {location}")]
    NotFound { location: Location },

    /// The metadata query was denied.
    #[error("permission denied: {location}")]
    PermissionDenied { location: Location },

    /// Any other I/O failure from the metadata query.
    #[error("failed to load {location}: {source}")]
    Io {
        location: Location,
        #[source]
        source: std::io::Error,
    },

    /// The load was cancelled through its cancellation token.
    #[error("load cancelled: {location}")]
    Cancelled { location: Location },
}

impl LoadError {
    /// Classify an I/O error from a metadata query against `location`.
    pub(crate) fn from_io(location: &Location, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound {
                location: location.clone(),
            },
            std::io::ErrorKind::PermissionDenied => LoadError::PermissionDenied {
                location: location.clone(),
            },
            _ => LoadError::Io {
                location: location.clone(),
                source: err,
            },
        }
    }

    /// The location the failed load was issued against.
    pub fn location(&self) -> &Location {
        match self {
            LoadError::NotFound { location }
            | LoadError::PermissionDenied { location }
            | LoadError::Io { location, .. }
            | LoadError::Cancelled { location } => location,
        }
    }
}

/// Errors raised by [`crate::filesystem::record::FileRecord::rename`].
///
/// On failure the record's prior identity and snapshot remain valid.
#[derive(Error, Debug)]
pub enum RenameError {
    /// Empty name, or a name containing a path separator.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// The record is not backed by a renameable local path.
    #[error("cannot rename {0}: not a local file")]
    NotLocal(Location),

    /// Rewriting the desktop entry's name key failed.
    #[error("failed to update desktop entry {path:?}: {source}")]
    KeyFileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filesystem rename itself failed.
    #[error("failed to rename {from:?} to {to:?}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised reading or writing the bookmarks file.
///
/// Read failures tolerate partial success (entries parsed before the failure
/// point are kept by the caller); write failures never corrupt the previous
/// file contents, because writes go through a temporary file and rename.
#[derive(Error, Debug)]
pub enum BookmarksError {
    #[error("failed to read bookmarks from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write bookmarks to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the filesystem change monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("cannot watch {0}: not a local path")]
    NotLocal(Location),
}
