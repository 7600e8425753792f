// SPDX-License-Identifier: LGPL-3.0-only
//! Persisted preferences.
//!
//! Settings live in a TOML file under the XDG config home
//! (`~/.config/cabinet/settings.toml`). A missing file means defaults; a
//! malformed file is logged and replaced by defaults rather than aborting.

use crate::listing::sort::SortSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use xdg::BaseDirectories;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Listing view preferences.
    #[serde(default)]
    pub view: ViewSettings,
    /// Shortcuts panel preferences.
    #[serde(default)]
    pub shortcuts: ShortcutSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewSettings {
    #[serde(default)]
    pub sort: SortSettings,
    #[serde(default)]
    pub show_hidden: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShortcutSettings {
    /// URIs of bookmarks the user hid from the shortcuts panel.
    /// Membership is exact string equality on the canonical URI.
    #[serde(default)]
    pub hidden_bookmarks: Vec<String>,
}

/// Loads and saves the [`Settings`] file.
pub struct SettingsStore {
    settings: Settings,
    path: PathBuf,
}

impl SettingsStore {
    /// Create a store bound to the standard config location and load it.
    pub fn new() -> Result<Self> {
        let xdg_dirs = BaseDirectories::with_prefix("cabinet")
            .context("failed to resolve XDG base directories")?;
        let path = xdg_dirs.get_config_home().join("settings.toml");
        let mut store = Self::with_path(path);
        store.load()?;
        Ok(store)
    }

    /// Create a store bound to an explicit file, without loading it.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            settings: Settings::default(),
            path,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// (Re)load from disk. A missing file yields defaults; a file that
    /// fails to parse is logged and also yields defaults.
    pub fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            self.settings = Settings::default();
            return Ok(());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read settings file {:?}", self.path))?;
        self.settings = match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(err) => {
                log::error!("failed to parse settings file {:?}: {}", self.path, err);
                Settings::default()
            }
        };
        Ok(())
    }

    /// Write the settings out, through a temporary file and rename.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {:?}", parent))?;
        }
        let content =
            toml::to_string_pretty(&self.settings).context("failed to serialize settings")?;
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("failed to write settings file {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace settings file {:?}", self.path))?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn is_bookmark_hidden(&self, uri: &str) -> bool {
        self.settings
            .shortcuts
            .hidden_bookmarks
            .iter()
            .any(|hidden| hidden == uri)
    }

    /// Add or remove `uri` from the hidden-bookmarks list. Returns whether
    /// the list actually changed.
    pub fn set_bookmark_hidden(&mut self, uri: &str, hidden: bool) -> bool {
        let list = &mut self.settings.shortcuts.hidden_bookmarks;
        if hidden {
            if list.iter().any(|entry| entry == uri) {
                return false;
            }
            list.push(uri.to_string());
            true
        } else {
            let before = list.len();
            list.retain(|entry| entry != uri);
            list.len() != before
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::sort::SortColumn;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::with_path(dir.path().join("settings.toml"));
        store.load().unwrap();
        assert!(!store.get().view.show_hidden);
        assert_eq!(store.get().view.sort.column, SortColumn::Name);
        assert!(store.get().view.sort.folders_first);
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut store = SettingsStore::with_path(path.clone());
        store.get_mut().view.show_hidden = true;
        store.get_mut().view.sort.column = SortColumn::Size;
        store.get_mut().view.sort.ascending = false;
        store.set_bookmark_hidden("file:///home/user/Music", true);
        store.save().unwrap();

        let mut reread = SettingsStore::with_path(path);
        reread.load().unwrap();
        assert!(reread.get().view.show_hidden);
        assert_eq!(reread.get().view.sort.column, SortColumn::Size);
        assert!(!reread.get().view.sort.ascending);
        assert!(reread.is_bookmark_hidden("file:///home/user/Music"));
    }

    #[test]
    fn hidden_bookmarks_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::with_path(dir.path().join("settings.toml"));

        assert!(store.set_bookmark_hidden("file:///a", true));
        assert!(!store.set_bookmark_hidden("file:///a", true));
        assert!(store.is_bookmark_hidden("file:///a"));
        assert!(store.set_bookmark_hidden("file:///a", false));
        assert!(!store.is_bookmark_hidden("file:///a"));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is { not toml").unwrap();

        let mut store = SettingsStore::with_path(path);
        store.load().unwrap();
        assert!(!store.get().view.show_hidden);
    }
}
