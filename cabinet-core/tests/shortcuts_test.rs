// SPDX-License-Identifier: LGPL-3.0-only
//! Shortcuts panel persistence across model and settings instances.

use cabinet_core::{
    BookmarksFile, FileCache, Location, SettingsStore, ShortcutGroup, ShortcutsModel,
};

fn dir_bookmark(dir: &tempfile::TempDir, name: &str) -> String {
    let path = dir.path().join(name);
    std::fs::create_dir(&path).unwrap();
    Location::from_path(path).uri()
}

#[test]
fn hidden_bookmarks_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FileCache::new();
    let settings_path = dir.path().join("settings.toml");
    let bookmarks_path = dir.path().join("bookmarks");

    let music = dir_bookmark(&dir, "Music");
    let docs = dir_bookmark(&dir, "Documents");
    std::fs::write(&bookmarks_path, format!("{}\n{}\n", music, docs)).unwrap();

    // First session: hide one bookmark and persist.
    {
        let mut settings = SettingsStore::with_path(settings_path.clone());
        let mut model = ShortcutsModel::new(BookmarksFile::with_path(bookmarks_path.clone()));
        model.load_bookmarks(&cache, &settings).unwrap();

        let index = model
            .entries()
            .iter()
            .position(|entry| entry.uri().as_deref() == Some(music.as_str()))
            .unwrap();
        model.set_hidden(index, true, &mut settings);
        settings.save().unwrap();
    }

    // Second session: the hidden flag comes back from the settings file.
    let mut settings = SettingsStore::with_path(settings_path);
    settings.load().unwrap();
    let mut model = ShortcutsModel::new(BookmarksFile::with_path(bookmarks_path));
    model.load_bookmarks(&cache, &settings).unwrap();

    let hidden: Vec<bool> = model
        .entries()
        .iter()
        .filter(|entry| entry.is_bookmark())
        .map(|entry| entry.is_hidden())
        .collect();
    assert_eq!(hidden, vec![true, false]);
    assert!(!model.header(ShortcutGroup::Places).unwrap().is_hidden());
}

#[test]
fn reload_after_save_reproduces_the_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FileCache::new();
    let settings = SettingsStore::with_path(dir.path().join("settings.toml"));
    let bookmarks_path = dir.path().join("bookmarks");

    let a = dir_bookmark(&dir, "alpha");
    let b = dir_bookmark(&dir, "beta");
    std::fs::write(
        &bookmarks_path,
        format!("{} First\nsftp://host/share\n{}\n", a, b),
    )
    .unwrap();

    let mut model = ShortcutsModel::new(BookmarksFile::with_path(bookmarks_path.clone()));
    model.load_bookmarks(&cache, &settings).unwrap();
    model.save_bookmarks().unwrap();
    assert!(model.should_ignore_change());

    let mut second = ShortcutsModel::new(BookmarksFile::with_path(bookmarks_path));
    second.load_bookmarks(&cache, &settings).unwrap();

    let sequence = |m: &ShortcutsModel| -> Vec<(ShortcutGroup, String)> {
        m.entries()
            .iter()
            .filter(|entry| entry.is_bookmark())
            .map(|entry| (entry.group(), entry.display_name()))
            .collect()
    };
    assert_eq!(sequence(&model), sequence(&second));
}
