// SPDX-License-Identifier: LGPL-3.0-only
//! GTK-style bookmarks file access.
//!
//! The file is line oriented, one `<uri>[ <display-name>]` entry per line.
//! Order is significant: it defines the default position of each bookmark
//! in the shortcuts listing.

use crate::error::BookmarksError;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub uri: String,
    pub name: Option<String>,
}

impl Bookmark {
    fn to_line(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {}", self.uri, name),
            None => self.uri.clone(),
        }
    }
}

/// Ordered view of one bookmarks file.
pub struct BookmarksFile {
    bookmarks: Vec<Bookmark>,
    path: PathBuf,
}

impl BookmarksFile {
    /// Use the conventional `~/.config/gtk-3.0/bookmarks` location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        });
        Self::with_path(config_dir.join("gtk-3.0").join("bookmarks"))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            bookmarks: Vec::new(),
            path,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the file, replacing the in-memory entries.
    ///
    /// A missing file is an empty bookmark list, not an error. Blank lines
    /// and comments are skipped; entry order is preserved.
    pub fn load(&mut self) -> Result<(), BookmarksError> {
        self.bookmarks.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| BookmarksError::Read {
            path: self.path.clone(),
            source,
        })?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (uri, name) = match line.split_once(' ') {
                Some((uri, name)) => (uri, Some(name.trim().to_string())),
                None => (line, None),
            };
            self.bookmarks.push(Bookmark {
                uri: uri.to_string(),
                name,
            });
        }

        Ok(())
    }

    /// Write the entries back out, in order.
    ///
    /// The write goes through a temporary file and rename, so a failure
    /// never corrupts the previous contents.
    pub fn save(&self) -> Result<(), BookmarksError> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut content = self
                .bookmarks
                .iter()
                .map(Bookmark::to_line)
                .collect::<Vec<_>>()
                .join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            let tmp = self.path.with_extension("tmp");
            fs::write(&tmp, content)?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|source| BookmarksError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// The entries in file order.
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn set_bookmarks(&mut self, bookmarks: Vec<Bookmark>) {
        self.bookmarks = bookmarks;
    }

    pub fn add(&mut self, uri: String, name: Option<String>) {
        self.bookmarks.push(Bookmark { uri, name });
    }

    /// Remove every entry with the given URI.
    pub fn remove(&mut self, uri: &str) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|bookmark| bookmark.uri != uri);
        self.bookmarks.len() != before
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.bookmarks.iter().any(|bookmark| bookmark.uri == uri)
    }
}

impl Default for BookmarksFile {
    fn default() -> Self {
        Self::new()
    }
}
