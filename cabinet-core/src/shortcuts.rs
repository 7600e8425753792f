// SPDX-License-Identifier: LGPL-3.0-only
//! The shortcuts side-panel model.
//!
//! Three groups in fixed order, each with a header row: devices, network
//! and places. Devices come and go through the device subsystem; network
//! and places entries come from the GTK bookmarks file plus a handful of
//! seeded defaults (home, desktop, filesystem root, trash). Within a group
//! the order is header first, then defaults, then bookmarks, sorted by
//! explicit sort id (bookmark line number, device arrival order) and name.
//!
//! The model is not thread-safe; like the listings it belongs to a single
//! mutation context.

use crate::bookmarks::{Bookmark, BookmarksFile};
use crate::error::BookmarksError;
use crate::filesystem::cache::FileCache;
use crate::filesystem::location::Location;
use crate::filesystem::record::FileRecord;
use crate::listing::RowEvent;
use crate::observer::{ObserverId, ObserverList};
use crate::settings::SettingsStore;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// External-change notifications arriving this close to our own save are
/// assumed to be echoes of it.
const SAVE_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShortcutGroup {
    Devices,
    Network,
    Places,
}

/// A volume or mountable device, as reported by the device subsystem.
#[derive(Debug, Clone)]
pub struct Device {
    /// Stable identifier from the device subsystem.
    pub id: String,
    pub label: String,
    /// Mount point, once mounted.
    pub location: Option<Location>,
    /// Hidden flag owned by the device subsystem's own hidden-set.
    pub hidden: bool,
}

/// What a shortcut row points at.
#[derive(Debug, Clone)]
pub enum ShortcutTarget {
    /// A group header row.
    Header,
    /// A locally addressable entry, backed by a live record.
    Record(Arc<FileRecord>),
    /// A remote bookmark kept as a bare location with a generic icon.
    RemoteLocation(Location),
    Device(Device),
}

/// Tier within a group; headers sort first, seeded defaults before
/// user bookmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Header,
    Default,
    Bookmark,
}

#[derive(Debug, Clone)]
pub struct Shortcut {
    group: ShortcutGroup,
    tier: Tier,
    target: ShortcutTarget,
    /// Bookmark line number, device arrival order, or seed position.
    sort_id: u32,
    name_override: Option<String>,
    hidden: bool,
}

impl Shortcut {
    pub fn group(&self) -> ShortcutGroup {
        self.group
    }

    pub fn target(&self) -> &ShortcutTarget {
        &self.target
    }

    pub fn is_header(&self) -> bool {
        self.tier == Tier::Header
    }

    pub fn is_bookmark(&self) -> bool {
        self.tier == Tier::Bookmark
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn sort_id(&self) -> u32 {
        self.sort_id
    }

    /// The label a panel shows for this row.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name_override {
            return name.clone();
        }
        match &self.target {
            ShortcutTarget::Header => match self.group {
                ShortcutGroup::Devices => "Devices".to_string(),
                ShortcutGroup::Network => "Network".to_string(),
                ShortcutGroup::Places => "Places".to_string(),
            },
            ShortcutTarget::Record(record) => record.display_name(),
            ShortcutTarget::RemoteLocation(location) => location.basename(),
            ShortcutTarget::Device(device) => device.label.clone(),
        }
    }

    /// The location this row navigates to, if it has one.
    pub fn location(&self) -> Option<Location> {
        match &self.target {
            ShortcutTarget::Header => None,
            ShortcutTarget::Record(record) => Some(record.location()),
            ShortcutTarget::RemoteLocation(location) => Some(location.clone()),
            ShortcutTarget::Device(device) => device.location.clone(),
        }
    }

    /// Canonical URI used for persistence (bookmark lines, hidden list).
    pub fn uri(&self) -> Option<String> {
        match &self.target {
            ShortcutTarget::Header => None,
            ShortcutTarget::Record(record) => Some(record.uri()),
            ShortcutTarget::RemoteLocation(location) => Some(location.uri()),
            ShortcutTarget::Device(_) => None,
        }
    }

    fn sort_key(&self) -> (ShortcutGroup, Tier, u32, String) {
        (self.group, self.tier, self.sort_id, self.display_name())
    }
}

/// The ordered, observable sequence of shortcut rows.
pub struct ShortcutsModel {
    entries: Vec<Shortcut>,
    bookmarks_file: BookmarksFile,
    device_seq: u32,
    last_save: Option<Instant>,
    row_observers: ObserverList<RowEvent>,
}

impl ShortcutsModel {
    pub fn new(bookmarks_file: BookmarksFile) -> Self {
        let mut model = ShortcutsModel {
            entries: Vec::new(),
            bookmarks_file,
            device_seq: 0,
            last_save: None,
            row_observers: ObserverList::new(),
        };
        for group in [
            ShortcutGroup::Devices,
            ShortcutGroup::Network,
            ShortcutGroup::Places,
        ] {
            model.entries.push(Shortcut {
                group,
                tier: Tier::Header,
                target: ShortcutTarget::Header,
                sort_id: 0,
                name_override: None,
                // Headers of empty groups start hidden.
                hidden: true,
            });
        }
        model
    }

    /// Seed the places group with the conventional default entries:
    /// home, desktop, filesystem root and trash.
    pub fn add_defaults(&mut self, cache: &FileCache) {
        let mut seed: Vec<(Location, Option<String>)> = Vec::new();
        if let Some(home) = dirs::home_dir() {
            seed.push((Location::from_path(home), None));
        }
        if let Some(desktop) = dirs::desktop_dir() {
            seed.push((Location::from_path(desktop), None));
        }
        seed.push((Location::from_path("/"), None));
        seed.push((Location::from_uri("trash:///"), Some("Trash".to_string())));
        seed.push((Location::from_uri("recent:///"), Some("Recent".to_string())));

        for (index, (location, name_override)) in seed.into_iter().enumerate() {
            let target = if location.is_local() {
                match cache.get_or_create(&location, None) {
                    Ok(record) => ShortcutTarget::Record(record),
                    Err(err) => {
                        log::debug!("skipping default shortcut {}: {}", location, err);
                        continue;
                    }
                }
            } else {
                ShortcutTarget::RemoteLocation(location)
            };
            self.insert_entry(Shortcut {
                group: ShortcutGroup::Places,
                tier: Tier::Default,
                target,
                sort_id: index as u32,
                name_override,
                hidden: false,
            });
        }
    }

    // --- observers ---------------------------------------------------------

    pub fn on_rows<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&RowEvent) + Send + Sync + 'static,
    {
        self.row_observers.subscribe(callback)
    }

    pub fn unsubscribe_rows(&self, id: ObserverId) -> bool {
        self.row_observers.unsubscribe(id)
    }

    // --- devices -----------------------------------------------------------

    pub fn add_device(&mut self, device: Device) {
        let sort_id = self.device_seq;
        self.device_seq += 1;
        let hidden = device.hidden;
        self.insert_entry(Shortcut {
            group: ShortcutGroup::Devices,
            tier: Tier::Default,
            target: ShortcutTarget::Device(device),
            sort_id,
            name_override: None,
            hidden,
        });
    }

    pub fn remove_device(&mut self, id: &str) {
        let index = self.entries.iter().position(|entry| {
            matches!(&entry.target, ShortcutTarget::Device(device) if device.id == id)
        });
        if let Some(index) = index {
            self.entries.remove(index);
            self.row_observers.emit(&RowEvent::Deleted { index });
            self.recompute_header(ShortcutGroup::Devices);
        }
    }

    /// Apply an updated device snapshot (label, mount point, hidden flag).
    pub fn device_changed(&mut self, device: Device) {
        let index = self.entries.iter().position(|entry| {
            matches!(&entry.target, ShortcutTarget::Device(existing) if existing.id == device.id)
        });
        let Some(index) = index else {
            return;
        };
        self.entries[index].hidden = device.hidden;
        self.entries[index].target = ShortcutTarget::Device(device);
        self.row_observers.emit(&RowEvent::Changed { index });
        self.resort();
        self.recompute_header(ShortcutGroup::Devices);
    }

    // --- bookmarks ---------------------------------------------------------

    /// (Re)load the bookmarks file into the network and places groups.
    ///
    /// Local bookmark targets resolve to records (non-directories are
    /// skipped); remote targets stay bare locations. Line number becomes
    /// the sort id, so file order is preserved. The hidden flag comes from
    /// the persisted hidden-bookmarks list.
    pub fn load_bookmarks(
        &mut self,
        cache: &FileCache,
        settings: &SettingsStore,
    ) -> Result<(), BookmarksError> {
        self.bookmarks_file.load()?;

        // Drop previously loaded bookmark rows before re-inserting.
        for index in (0..self.entries.len()).rev() {
            if self.entries[index].tier == Tier::Bookmark {
                self.entries.remove(index);
                self.row_observers.emit(&RowEvent::Deleted { index });
            }
        }

        let bookmarks: Vec<Bookmark> = self.bookmarks_file.bookmarks().to_vec();
        for (line, bookmark) in bookmarks.into_iter().enumerate() {
            let location = Location::from_uri(&bookmark.uri);
            let (group, target) = if location.is_local() {
                let record = match cache.get_or_create(&location, None) {
                    Ok(record) => record,
                    Err(err) => {
                        log::debug!("skipping bookmark {}: {}", bookmark.uri, err);
                        continue;
                    }
                };
                if !record.is_directory() {
                    log::debug!("skipping non-directory bookmark {}", bookmark.uri);
                    continue;
                }
                (ShortcutGroup::Places, ShortcutTarget::Record(record))
            } else {
                (ShortcutGroup::Network, ShortcutTarget::RemoteLocation(location))
            };

            let hidden = settings.is_bookmark_hidden(&bookmark.uri);
            self.insert_entry(Shortcut {
                group,
                tier: Tier::Bookmark,
                target,
                sort_id: line as u32,
                name_override: bookmark.name,
                hidden,
            });
        }
        Ok(())
    }

    /// Serialize the bookmark rows back to the bookmarks file.
    ///
    /// Line order follows the current sort order, so a load immediately
    /// after produces the same sequence. Records the save time for
    /// [`ShortcutsModel::should_ignore_change`].
    pub fn save_bookmarks(&mut self) -> Result<(), BookmarksError> {
        let bookmarks = self
            .entries
            .iter()
            .filter(|entry| entry.tier == Tier::Bookmark)
            .filter_map(|entry| {
                entry.uri().map(|uri| Bookmark {
                    uri,
                    name: entry.name_override.clone(),
                })
            })
            .collect();
        self.bookmarks_file.set_bookmarks(bookmarks);
        self.bookmarks_file.save()?;
        self.last_save = Some(Instant::now());
        Ok(())
    }

    /// Whether an external change notification for the bookmarks file
    /// should be ignored as the echo of our own recent save.
    pub fn should_ignore_change(&self) -> bool {
        self.last_save
            .map(|saved| saved.elapsed() < SAVE_DEBOUNCE)
            .unwrap_or(false)
    }

    // --- row operations ------------------------------------------------------

    /// Hide or show the row at `index`.
    ///
    /// Device rows delegate to the device subsystem's hidden flag; other
    /// rows persist their URI in the hidden-bookmarks list. Either way the
    /// group header visibility is recomputed.
    pub fn set_hidden(&mut self, index: usize, hidden: bool, settings: &mut SettingsStore) {
        let Some(entry) = self.entries.get_mut(index) else {
            return;
        };
        if entry.tier == Tier::Header || entry.hidden == hidden {
            return;
        }
        entry.hidden = hidden;
        if let ShortcutTarget::Device(device) = &mut entry.target {
            device.hidden = hidden;
        } else if let Some(uri) = entry.uri() {
            settings.set_bookmark_hidden(&uri, hidden);
        }
        let group = entry.group;
        self.row_observers.emit(&RowEvent::Changed { index });
        self.recompute_header(group);
    }

    /// Rename a bookmark row's display label and re-persist the file.
    /// Only bookmark rows carry an editable label.
    pub fn rename(&mut self, index: usize, new_name: &str) -> Result<(), BookmarksError> {
        let Some(entry) = self.entries.get_mut(index) else {
            return Ok(());
        };
        if entry.tier != Tier::Bookmark {
            return Ok(());
        }
        entry.name_override = if new_name.is_empty() {
            None
        } else {
            Some(new_name.to_string())
        };
        self.row_observers.emit(&RowEvent::Changed { index });
        self.save_bookmarks()
    }

    // --- queries -------------------------------------------------------------

    /// All rows, headers included, in order.
    pub fn entries(&self) -> &[Shortcut] {
        &self.entries
    }

    /// The rows a panel actually shows.
    pub fn visible(&self) -> Vec<&Shortcut> {
        self.entries.iter().filter(|entry| !entry.hidden).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn header(&self, group: ShortcutGroup) -> Option<&Shortcut> {
        self.entries
            .iter()
            .find(|entry| entry.group == group && entry.tier == Tier::Header)
    }

    // --- internals -------------------------------------------------------------

    fn insert_entry(&mut self, entry: Shortcut) {
        let key = entry.sort_key();
        let index = self
            .entries
            .partition_point(|existing| existing.sort_key() <= key);
        let group = entry.group;
        self.entries.insert(index, entry);
        self.row_observers.emit(&RowEvent::Inserted { index });
        self.recompute_header(group);
    }

    fn resort(&mut self) {
        let mut indexed: Vec<(usize, Shortcut)> =
            self.entries.drain(..).enumerate().collect();
        indexed.sort_by(|(_, x), (_, y)| x.sort_key().cmp(&y.sort_key()));

        let order: Vec<usize> = indexed.iter().map(|(old, _)| *old).collect();
        self.entries = indexed.into_iter().map(|(_, entry)| entry).collect();

        if !order.iter().enumerate().all(|(new, &old)| new == old) {
            self.row_observers
                .emit(&RowEvent::Reordered { new_order: order });
        }
    }

    /// A header is hidden exactly when its group has no visible members.
    fn recompute_header(&mut self, group: ShortcutGroup) {
        let all_hidden = !self
            .entries
            .iter()
            .any(|entry| entry.group == group && entry.tier != Tier::Header && !entry.hidden);

        let header_index = self
            .entries
            .iter()
            .position(|entry| entry.group == group && entry.tier == Tier::Header);
        if let Some(index) = header_index {
            if self.entries[index].hidden != all_hidden {
                self.entries[index].hidden = all_hidden;
                self.row_observers.emit(&RowEvent::Changed { index });
            }
        }
    }
}
