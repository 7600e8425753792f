// SPDX-License-Identifier: LGPL-3.0-only
//! Sorted, observable directory listings.
//!
//! A [`ListingModel`] maintains the visible rows of one directory: always
//! sorted under the active comparator, hidden entries filtered out, and
//! every membership or order change announced through row events. The
//! model subscribes to each member record, so metadata changes reposition
//! rows and destroyed records leave the listing on their own.

pub mod sort;

use crate::error::LoadError;
use crate::filesystem::cache::FileCache;
use crate::filesystem::location::Location;
use crate::filesystem::record::FileRecord;
use crate::observer::{ObserverId, ObserverList};
use sort::{compare_files, SortColumn, SortSettings};
use std::sync::{Arc, Mutex, Weak};

/// A change to the visible row sequence.
///
/// Events are emitted after the rows already reflect the change, so a
/// handler reading the model sees a state consistent with the event.
#[derive(Debug, Clone)]
pub enum RowEvent {
    /// A row appeared at `index`.
    Inserted { index: usize },
    /// The row at `index` changed in place.
    Changed { index: usize },
    /// The row that was at `index` is gone.
    Deleted { index: usize },
    /// The whole sequence was rearranged; `new_order[new_index]` gives the
    /// previous index of the row now at `new_index`.
    Reordered { new_order: Vec<usize> },
}

struct Row {
    record: Arc<FileRecord>,
    changed_id: ObserverId,
    destroyed_id: ObserverId,
}

struct ListingState {
    visible: Vec<Row>,
    /// Members filtered out by the hidden-file rule, kept so toggling
    /// `show_hidden` does not re-read the directory.
    hidden: Vec<Row>,
    settings: SortSettings,
    show_hidden: bool,
    source: Option<Location>,
}

struct ListingInner {
    // Handed to record subscriptions so callbacks can reach the model
    // without keeping it alive.
    weak_self: Weak<ListingInner>,
    state: Mutex<ListingState>,
    row_observers: ObserverList<RowEvent>,
}

/// An observable, sorted view of one directory's entries.
#[derive(Clone)]
pub struct ListingModel {
    inner: Arc<ListingInner>,
}

impl ListingModel {
    pub fn new() -> Self {
        ListingModel {
            inner: Arc::new_cyclic(|weak| ListingInner {
                weak_self: Weak::clone(weak),
                state: Mutex::new(ListingState {
                    visible: Vec::new(),
                    hidden: Vec::new(),
                    settings: SortSettings::default(),
                    show_hidden: false,
                    source: None,
                }),
                row_observers: ObserverList::new(),
            }),
        }
    }

    /// Subscribe to row events.
    pub fn on_rows<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&RowEvent) + Send + Sync + 'static,
    {
        self.inner.row_observers.subscribe(callback)
    }

    pub fn unsubscribe_rows(&self, id: ObserverId) -> bool {
        self.inner.row_observers.unsubscribe(id)
    }

    /// Replace the listing's contents with the entries of `location`.
    ///
    /// Existing rows are removed (deletion events from the back), then the
    /// new members are inserted in sorted order. Entries whose records fail
    /// to load are skipped. A source that is not a local directory yields
    /// an empty membership.
    pub fn set_source(&self, cache: &FileCache, location: &Location) -> Result<(), LoadError> {
        let mut records = Vec::new();
        if let Some(dir_path) = location.as_path() {
            let entries = std::fs::read_dir(dir_path)
                .map_err(|err| LoadError::from_io(location, err))?;
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        log::debug!("skipping unreadable entry in {}: {}", location, err);
                        continue;
                    }
                };
                let child = Location::from_path(entry.path());
                match cache.get_or_create(&child, None) {
                    Ok(record) => records.push(record),
                    Err(err) => log::debug!("skipping {}: {}", child, err),
                }
            }
        }

        // Detach from the previous source, announcing each removal while the
        // rows still reflect it.
        loop {
            let event = {
                let mut state = self.inner.state.lock().unwrap();
                match state.visible.pop() {
                    Some(row) => {
                        let index = state.visible.len();
                        self.inner.release_row(row);
                        Some(RowEvent::Deleted { index })
                    }
                    None => None,
                }
            };
            match event {
                Some(event) => self.inner.row_observers.emit(&event),
                None => break,
            }
        }

        let settings = {
            let mut state = self.inner.state.lock().unwrap();
            for row in state.hidden.drain(..) {
                self.inner.release_row(row);
            }
            state.source = Some(location.clone());
            state.settings
        };

        records.sort_by(|a, b| compare_files(a, b, &settings));
        for record in records {
            self.inner.insert_member(record);
        }
        Ok(())
    }

    /// Add `records` as members, each at its sorted position. Each insertion
    /// is announced before the next one is applied.
    pub fn members_added(&self, records: &[Arc<FileRecord>]) {
        for record in records {
            self.inner.insert_member(Arc::clone(record));
        }
    }

    /// Remove `records` from the membership.
    pub fn members_removed(&self, records: &[Arc<FileRecord>]) {
        for record in records {
            self.inner.remove_member(record);
        }
    }

    /// Change the sort column and direction.
    pub fn set_sort(&self, column: SortColumn, ascending: bool) {
        self.inner.update_settings(|settings| {
            settings.column = column;
            settings.ascending = ascending;
        });
    }

    pub fn set_case_sensitive(&self, case_sensitive: bool) {
        self.inner
            .update_settings(|settings| settings.case_sensitive = case_sensitive);
    }

    pub fn set_folders_first(&self, folders_first: bool) {
        self.inner
            .update_settings(|settings| settings.folders_first = folders_first);
    }

    /// Toggle visibility of hidden entries.
    ///
    /// Enabling inserts each parked hidden member at its sorted position
    /// without disturbing the others; disabling removes them again.
    pub fn set_show_hidden(&self, show_hidden: bool) {
        let parked = {
            let mut state = self.inner.state.lock().unwrap();
            if state.show_hidden == show_hidden {
                return;
            }
            state.show_hidden = show_hidden;
            if show_hidden {
                std::mem::take(&mut state.hidden)
            } else {
                Vec::new()
            }
        };

        if show_hidden {
            for row in parked {
                let event = {
                    let mut state = self.inner.state.lock().unwrap();
                    let index = insert_position(&state.visible, &row.record, &state.settings);
                    state.visible.insert(index, row);
                    RowEvent::Inserted { index }
                };
                self.inner.row_observers.emit(&event);
            }
        } else {
            loop {
                let event = {
                    let mut state = self.inner.state.lock().unwrap();
                    match state
                        .visible
                        .iter()
                        .rposition(|row| row.record.is_hidden_file())
                    {
                        Some(index) => {
                            let row = state.visible.remove(index);
                            state.hidden.push(row);
                            Some(RowEvent::Deleted { index })
                        }
                        None => None,
                    }
                };
                match event {
                    Some(event) => self.inner.row_observers.emit(&event),
                    None => break,
                }
            }
        }
    }

    pub fn sort_settings(&self) -> SortSettings {
        self.inner.state.lock().unwrap().settings
    }

    pub fn show_hidden(&self) -> bool {
        self.inner.state.lock().unwrap().show_hidden
    }

    pub fn source(&self) -> Option<Location> {
        self.inner.state.lock().unwrap().source.clone()
    }

    /// The visible rows, in order.
    pub fn visible(&self) -> Vec<Arc<FileRecord>> {
        self.inner
            .state
            .lock()
            .unwrap()
            .visible
            .iter()
            .map(|row| Arc::clone(&row.record))
            .collect()
    }

    pub fn record_at(&self, index: usize) -> Option<Arc<FileRecord>> {
        self.inner
            .state
            .lock()
            .unwrap()
            .visible
            .get(index)
            .map(|row| Arc::clone(&row.record))
    }

    pub fn row_for_record(&self, record: &Arc<FileRecord>) -> Option<usize> {
        self.inner
            .state
            .lock()
            .unwrap()
            .visible
            .iter()
            .position(|row| Arc::ptr_eq(&row.record, record))
    }

    pub fn visible_len(&self) -> usize {
        self.inner.state.lock().unwrap().visible.len()
    }

    pub fn hidden_len(&self) -> usize {
        self.inner.state.lock().unwrap().hidden.len()
    }
}

impl Default for ListingModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingInner {
    /// Subscribe to `record` and file it under visible or hidden.
    /// Returns the visible insert index, if any. Caller holds the lock.
    fn add_record(&self, state: &mut ListingState, record: Arc<FileRecord>) -> Option<usize> {
        let row = self.subscribe_row(record);
        if !state.show_hidden && row.record.is_hidden_file() {
            state.hidden.push(row);
            return None;
        }
        let index = insert_position(&state.visible, &row.record, &state.settings);
        state.visible.insert(index, row);
        Some(index)
    }

    fn subscribe_row(&self, record: Arc<FileRecord>) -> Row {
        let weak = Weak::clone(&self.weak_self);
        let changed_id = record.on_changed({
            let weak = Weak::clone(&weak);
            move |rec| {
                if let Some(inner) = weak.upgrade() {
                    inner.member_changed(rec);
                }
            }
        });
        let destroyed_id = record.on_destroyed({
            let weak = Weak::clone(&weak);
            move |rec| {
                if let Some(inner) = weak.upgrade() {
                    inner.member_destroyed(rec);
                }
            }
        });
        Row {
            record,
            changed_id,
            destroyed_id,
        }
    }

    fn contains(&self, state: &ListingState, record: &Arc<FileRecord>) -> bool {
        state
            .visible
            .iter()
            .chain(state.hidden.iter())
            .any(|row| Arc::ptr_eq(&row.record, record))
    }

    fn release_row(&self, row: Row) {
        row.record.unsubscribe_changed(row.changed_id);
        row.record.unsubscribe_destroyed(row.destroyed_id);
    }

    /// Insert one member and announce it, the lock released first so a
    /// handler reading the model finds the row at the announced index.
    fn insert_member(&self, record: Arc<FileRecord>) {
        let event = {
            let mut state = self.state.lock().unwrap();
            if self.contains(&state, &record) {
                return;
            }
            self.add_record(&mut state, record)
                .map(|index| RowEvent::Inserted { index })
        };
        if let Some(event) = event {
            self.row_observers.emit(&event);
        }
    }

    fn remove_member(&self, record: &Arc<FileRecord>) {
        let mut event = None;
        {
            let mut state = self.state.lock().unwrap();
            if let Some(index) = state
                .visible
                .iter()
                .position(|row| Arc::ptr_eq(&row.record, record))
            {
                let row = state.visible.remove(index);
                self.release_row(row);
                event = Some(RowEvent::Deleted { index });
            } else if let Some(index) = state
                .hidden
                .iter()
                .position(|row| Arc::ptr_eq(&row.record, record))
            {
                let row = state.hidden.remove(index);
                self.release_row(row);
            } else {
                log::debug!("removal of {}: not a member of this listing", record.location());
                debug_assert!(false, "removed record is not a member of this listing");
            }
        }
        if let Some(event) = event {
            self.row_observers.emit(&event);
        }
    }

    /// React to a member record's metadata change: announce the in-place
    /// change while the row still holds its index, then fix visibility and
    /// ordering with their own events.
    fn member_changed(&self, record: &FileRecord) {
        let ptr = record as *const FileRecord;

        let changed = {
            let state = self.state.lock().unwrap();
            state
                .visible
                .iter()
                .position(|row| Arc::as_ptr(&row.record) == ptr)
                .map(|index| RowEvent::Changed { index })
        };
        let was_visible = changed.is_some();
        if let Some(event) = changed {
            self.row_observers.emit(&event);
        }

        let follow_up = {
            let mut state = self.state.lock().unwrap();
            if was_visible {
                match state
                    .visible
                    .iter()
                    .position(|row| Arc::as_ptr(&row.record) == ptr)
                {
                    Some(index)
                        if !state.show_hidden
                            && state.visible[index].record.is_hidden_file() =>
                    {
                        let row = state.visible.remove(index);
                        state.hidden.push(row);
                        Some(RowEvent::Deleted { index })
                    }
                    Some(index) => bubble(&mut state, index)
                        .map(|new_order| RowEvent::Reordered { new_order }),
                    None => None,
                }
            } else {
                match state
                    .hidden
                    .iter()
                    .position(|row| Arc::as_ptr(&row.record) == ptr)
                {
                    Some(index)
                        if state.show_hidden
                            || !state.hidden[index].record.is_hidden_file() =>
                    {
                        let row = state.hidden.remove(index);
                        let insert_at =
                            insert_position(&state.visible, &row.record, &state.settings);
                        state.visible.insert(insert_at, row);
                        Some(RowEvent::Inserted { index: insert_at })
                    }
                    _ => None,
                }
            }
        };
        if let Some(event) = follow_up {
            self.row_observers.emit(&event);
        }
    }

    fn member_destroyed(&self, record: &FileRecord) {
        let ptr = record as *const FileRecord;
        let mut event = None;
        {
            let mut state = self.state.lock().unwrap();
            if let Some(index) = state
                .visible
                .iter()
                .position(|row| Arc::as_ptr(&row.record) == ptr)
            {
                let row = state.visible.remove(index);
                self.release_row(row);
                event = Some(RowEvent::Deleted { index });
            } else if let Some(index) = state
                .hidden
                .iter()
                .position(|row| Arc::as_ptr(&row.record) == ptr)
            {
                let row = state.hidden.remove(index);
                self.release_row(row);
            }
        }
        if let Some(event) = event {
            self.row_observers.emit(&event);
        }
    }

    fn update_settings<F: FnOnce(&mut SortSettings)>(&self, apply: F) {
        let mut event = None;
        {
            let mut state = self.state.lock().unwrap();
            let previous = state.settings;
            apply(&mut state.settings);
            if state.settings == previous {
                return;
            }
            if let Some(new_order) = resort(&mut state) {
                event = Some(RowEvent::Reordered { new_order });
            }
        }
        if let Some(event) = event {
            self.row_observers.emit(&event);
        }
    }
}

impl Drop for ListingInner {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        for row in state.visible.drain(..).chain(state.hidden.drain(..)) {
            row.record.unsubscribe_changed(row.changed_id);
            row.record.unsubscribe_destroyed(row.destroyed_id);
        }
    }
}

/// First index at which `record` can be inserted keeping the order stable
/// (after any equal rows).
fn insert_position(visible: &[Row], record: &Arc<FileRecord>, settings: &SortSettings) -> usize {
    visible.partition_point(|row| {
        compare_files(&row.record, record, settings) != std::cmp::Ordering::Greater
    })
}

/// Move the row at `index` to its sorted position, leaving every other row
/// in place relative to its neighbours. Returns the permutation
/// (`new_order[new_index]` = old index) when the row actually moved.
fn bubble(state: &mut ListingState, index: usize) -> Option<Vec<usize>> {
    let row = state.visible.remove(index);
    let target = insert_position(&state.visible, &row.record, &state.settings);
    state.visible.insert(target, row);
    if target == index {
        return None;
    }

    let mut order: Vec<usize> = (0..state.visible.len()).collect();
    order[target] = index;
    if target < index {
        // The row moved up; everything it passed slid down one slot.
        for new_index in target + 1..=index {
            order[new_index] = new_index - 1;
        }
    } else {
        for new_index in index..target {
            order[new_index] = new_index + 1;
        }
    }
    Some(order)
}

/// Stable full re-sort of the visible rows. Returns the permutation
/// (`new_order[new_index]` = old index) when anything moved.
fn resort(state: &mut ListingState) -> Option<Vec<usize>> {
    let settings = state.settings;
    let mut indexed: Vec<(usize, Row)> = state.visible.drain(..).enumerate().collect();
    indexed.sort_by(|(_, x), (_, y)| compare_files(&x.record, &y.record, &settings));

    let order: Vec<usize> = indexed.iter().map(|(old, _)| *old).collect();
    state.visible = indexed.into_iter().map(|(_, row)| row).collect();

    if order.iter().enumerate().all(|(new, &old)| new == old) {
        return None;
    }
    Some(order)
}
