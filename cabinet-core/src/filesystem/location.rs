// SPDX-License-Identifier: LGPL-3.0-only
//! Canonical location identifiers used as cache keys.
//!
//! A location is either a local absolute path or a remote URI. The URI
//! rendering must be stable, because it feeds the content-addressed
//! thumbnail digest and the bookmarks file.

use std::fmt;
use std::path::{Path, PathBuf};

/// An opaque, comparable handle to a filesystem entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// A local filesystem path (always absolute).
    Path(PathBuf),
    /// A non-`file` scheme URI, kept verbatim (e.g. `sftp://host/share`).
    Remote(String),
}

impl Location {
    /// Create a location for a local path, absolutizing relative input.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.is_absolute() {
            Location::Path(path.to_path_buf())
        } else {
            let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
            Location::Path(base.join(path))
        }
    }

    /// Parse a URI string. `file://` URIs become [`Location::Path`]; any
    /// other scheme is kept as [`Location::Remote`]; scheme-less input is
    /// treated as a plain path.
    pub fn from_uri(uri: &str) -> Self {
        if let Some(rest) = uri.strip_prefix("file://") {
            let decoded = urlencoding::decode(rest)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| rest.to_string());
            Location::from_path(PathBuf::from(decoded))
        } else if uri.contains("://") {
            Location::Remote(uri.to_string())
        } else {
            Location::from_path(PathBuf::from(uri))
        }
    }

    /// The canonical URI rendering.
    ///
    /// Paths are percent-encoded per segment; separators stay verbatim so
    /// the output matches the line format of GTK bookmarks files.
    pub fn uri(&self) -> String {
        match self {
            Location::Path(path) => {
                let raw = path.to_string_lossy();
                let encoded = urlencoding::encode(&raw).replace("%2F", "/");
                format!("file://{}", encoded)
            }
            Location::Remote(uri) => uri.clone(),
        }
    }

    /// The URI scheme (`"file"` for local paths).
    pub fn scheme(&self) -> &str {
        match self {
            Location::Path(_) => "file",
            Location::Remote(uri) => uri.split("://").next().unwrap_or(""),
        }
    }

    /// The final path component; `"/"` for the filesystem root, the host
    /// part for remote URIs without a path.
    pub fn basename(&self) -> String {
        match self {
            Location::Path(path) => match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => "/".to_string(),
            },
            Location::Remote(uri) => {
                let after_scheme = uri.split("://").nth(1).unwrap_or(uri);
                let trimmed = after_scheme.trim_end_matches('/');
                match trimmed.rsplit('/').next() {
                    Some(seg) if !seg.is_empty() => {
                        urlencoding::decode(seg).map(|c| c.into_owned()).unwrap_or_else(|_| seg.to_string())
                    }
                    _ => trimmed.to_string(),
                }
            }
        }
    }

    /// The parent location, if any.
    pub fn parent(&self) -> Option<Location> {
        match self {
            Location::Path(path) => path.parent().map(|p| Location::Path(p.to_path_buf())),
            Location::Remote(uri) => {
                let (scheme, rest) = uri.split_once("://")?;
                let trimmed = rest.trim_end_matches('/');
                let (parent, _) = trimmed.rsplit_once('/')?;
                if parent.is_empty() {
                    None
                } else {
                    Some(Location::Remote(format!("{}://{}", scheme, parent)))
                }
            }
        }
    }

    /// Whether this is the local filesystem root.
    pub fn is_root(&self) -> bool {
        matches!(self, Location::Path(path) if path.parent().is_none())
    }

    /// Whether this location is backed by a local path.
    pub fn is_local(&self) -> bool {
        matches!(self, Location::Path(_))
    }

    /// The local path, if this is a local location.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Location::Path(path) => Some(path),
            Location::Remote(_) => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(path) => write!(f, "{}", path.display()),
            Location::Remote(uri) => write!(f, "{}", uri),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_uri_round_trip() {
        let loc = Location::from_path("/home/user/My Documents");
        let uri = loc.uri();
        assert_eq!(uri, "file:///home/user/My%20Documents");
        assert_eq!(Location::from_uri(&uri), loc);
    }

    #[test]
    fn remote_uri_kept_verbatim() {
        let loc = Location::from_uri("sftp://server/share/music");
        assert_eq!(loc, Location::Remote("sftp://server/share/music".into()));
        assert_eq!(loc.uri(), "sftp://server/share/music");
        assert_eq!(loc.scheme(), "sftp");
        assert_eq!(loc.basename(), "music");
    }

    #[test]
    fn root_basename_and_parent() {
        let root = Location::from_path("/");
        assert!(root.is_root());
        assert_eq!(root.basename(), "/");
        assert_eq!(root.parent(), None);

        let child = Location::from_path("/etc");
        assert_eq!(child.parent(), Some(root));
    }

    #[test]
    fn remote_parent() {
        let loc = Location::from_uri("sftp://server/share/music");
        assert_eq!(
            loc.parent(),
            Some(Location::Remote("sftp://server/share".into()))
        );
        let host_only = Location::from_uri("sftp://server");
        assert_eq!(host_only.parent(), None);
        assert_eq!(host_only.basename(), "server");
    }
}
