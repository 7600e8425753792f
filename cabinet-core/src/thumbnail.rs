// SPDX-License-Identifier: LGPL-3.0-only
//! Content-addressed thumbnail cache paths.
//!
//! Follows the freedesktop.org Thumbnail Managing Standard naming scheme:
//! the cached preview of an entity lives at `{cache}/{md5(uri)}.png`.
//! Thumbnail generation itself is an external consumer of these paths.

use std::fs;
use std::path::{Path, PathBuf};

/// The cache directory for thumbnails.
///
/// `~/.cache/cabinet/thumbnails/normal/`, falling back to `$HOME` when no
/// cache directory can be determined.
pub fn thumbnail_cache_dir() -> PathBuf {
    let cache_base = dirs::cache_dir().unwrap_or_else(|| {
        PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
    });

    cache_base.join("cabinet").join("thumbnails").join("normal")
}

/// Compute the deterministic thumbnail path for a canonical URI.
pub fn thumbnail_path_for_uri(uri: &str) -> PathBuf {
    thumbnail_cache_dir().join(format!("{}.png", uri_digest(uri)))
}

/// MD5 digest of a canonical URI, rendered as lowercase hex.
pub fn uri_digest(uri: &str) -> String {
    let digest = md5::compute(uri.as_bytes());
    format!("{:x}", digest)
}

/// Whether `path` lies inside the thumbnail cache directory.
///
/// Records for cached previews are flagged so views render the file itself
/// as its own icon instead of scheduling another thumbnail for it.
pub fn is_in_cache_dir(path: &Path) -> bool {
    path.starts_with(thumbnail_cache_dir())
}

/// Check whether a cached thumbnail is still fresh.
///
/// Fresh means the thumbnail exists and its modification time is at least
/// as recent as the source file's.
pub fn is_fresh(thumbnail_path: &Path, file_path: &Path) -> bool {
    let thumb_mtime = match fs::metadata(thumbnail_path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    let file_mtime = match fs::metadata(file_path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    thumb_mtime >= file_mtime
}

/// Ensure the thumbnail cache directory exists.
pub fn ensure_cache_dir() -> std::io::Result<()> {
    let cache_dir = thumbnail_cache_dir();
    fs::create_dir_all(&cache_dir)?;
    log::debug!("thumbnail cache directory ensured: {:?}", cache_dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable() {
        // Known md5 of the example URI from the freedesktop thumbnail standard.
        assert_eq!(
            uri_digest("file:///home/jens/photos/me.png"),
            "c6ee772d9e49320e97ec29a7eb5b1697"
        );
    }

    #[test]
    fn path_is_deterministic() {
        let a = thumbnail_path_for_uri("file:///tmp/a.png");
        let b = thumbnail_path_for_uri("file:///tmp/a.png");
        let c = thumbnail_path_for_uri("file:///tmp/b.png");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.to_string_lossy().ends_with(".png"));
    }
}
