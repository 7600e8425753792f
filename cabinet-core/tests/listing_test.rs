// SPDX-License-Identifier: LGPL-3.0-only
//! Listing order, hidden handling and row events end to end.

use cabinet_core::listing::sort::{SortColumn, SortSettings};
use cabinet_core::{FileCache, ListingModel, Location, RowEvent};
use std::sync::{Arc, Mutex};

fn make_files(dir: &tempfile::TempDir, names: &[&str]) {
    for name in names {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }
}

fn visible_names(model: &ListingModel) -> Vec<String> {
    model
        .visible()
        .iter()
        .map(|record| record.display_name())
        .collect()
}

fn collect_events(model: &ListingModel) -> Arc<Mutex<Vec<RowEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    model.on_rows(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

#[test]
fn incremental_insert_matches_bulk_sort() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["delta", "alpha", "echo", "bravo", "charlie"]);
    let cache = FileCache::new();

    let bulk = ListingModel::new();
    bulk.set_source(&cache, &Location::from_path(dir.path())).unwrap();

    let incremental = ListingModel::new();
    for name in ["delta", "alpha", "echo", "bravo", "charlie"] {
        let record = cache
            .get_or_create(&Location::from_path(dir.path().join(name)), None)
            .unwrap();
        incremental.members_added(&[record]);
    }

    assert_eq!(visible_names(&bulk), visible_names(&incremental));
    assert_eq!(
        visible_names(&bulk),
        vec!["alpha", "bravo", "charlie", "delta", "echo"]
    );
}

#[test]
fn numeric_names_sort_by_value() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["file10", "file9", "file2"]);
    let cache = FileCache::new();

    let model = ListingModel::new();
    model.set_case_sensitive(true);
    model.set_source(&cache, &Location::from_path(dir.path())).unwrap();

    assert_eq!(visible_names(&model), vec!["file2", "file9", "file10"]);
}

#[test]
fn folders_sort_first_in_both_directions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("aaa"), b"x").unwrap();
    std::fs::create_dir(dir.path().join("zzz")).unwrap();
    let cache = FileCache::new();

    let model = ListingModel::new();
    model.set_source(&cache, &Location::from_path(dir.path())).unwrap();
    assert_eq!(visible_names(&model), vec!["zzz", "aaa"]);

    model.set_sort(SortColumn::Name, false);
    assert_eq!(visible_names(&model), vec!["zzz", "aaa"]);
}

#[test]
fn hidden_toggle_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["b.txt", "A", ".hidden"]);
    let cache = FileCache::new();

    let model = ListingModel::new();
    model.set_source(&cache, &Location::from_path(dir.path())).unwrap();

    // Default comparator: case-insensitive, folders first, by name.
    assert_eq!(visible_names(&model), vec!["A", "b.txt"]);
    assert_eq!(model.hidden_len(), 1);

    let events = collect_events(&model);
    model.set_show_hidden(true);
    assert_eq!(visible_names(&model), vec!["A", "b.txt", ".hidden"]);
    // The hidden entry was inserted; nothing else moved.
    {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RowEvent::Inserted { index: 2 }));
    }

    model.set_show_hidden(false);
    assert_eq!(visible_names(&model), vec!["A", "b.txt"]);
    assert_eq!(model.hidden_len(), 1);
}

#[test]
fn sort_change_emits_one_permutation() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["small", "medium!", "the-largest"]);
    std::fs::write(dir.path().join("small"), b"1").unwrap();
    std::fs::write(dir.path().join("medium!"), b"22").unwrap();
    std::fs::write(dir.path().join("the-largest"), b"333").unwrap();
    let cache = FileCache::new();

    let model = ListingModel::new();
    model.set_source(&cache, &Location::from_path(dir.path())).unwrap();
    let before = visible_names(&model);

    let events = collect_events(&model);
    model.set_sort(SortColumn::Size, true);

    assert_eq!(
        visible_names(&model),
        vec!["small", "medium!", "the-largest"]
    );
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    let RowEvent::Reordered { new_order } = &events[0] else {
        panic!("expected a reorder event");
    };
    // new_order[new_index] is the previous index of that row.
    for (new_index, &old_index) in new_order.iter().enumerate() {
        assert_eq!(
            visible_names(&model)[new_index],
            before[old_index],
            "permutation must map new positions to old"
        );
    }
}

#[test]
fn record_change_repositions_row() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["aaa.txt", "mmm.txt", "zzz.txt"]);
    let cache = FileCache::new();

    let model = ListingModel::new();
    model.set_source(&cache, &Location::from_path(dir.path())).unwrap();

    let record = cache
        .get_or_create(&Location::from_path(dir.path().join("mmm.txt")), None)
        .unwrap();
    let events = collect_events(&model);

    // Renaming updates the record in place and emits changed.
    record.rename("000.txt").unwrap();

    assert_eq!(visible_names(&model), vec!["000.txt", "aaa.txt", "zzz.txt"]);
    let events = events.lock().unwrap();
    assert!(matches!(events[0], RowEvent::Changed { index: 1 }));
    let RowEvent::Reordered { new_order } = &events[1] else {
        panic!("expected a reorder event");
    };
    // Only the renamed row and the row it slid past change position.
    assert_eq!(new_order, &[1, 0, 2]);
}

#[test]
fn changed_row_is_still_at_its_index_when_announced() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["aaa.txt", "mmm.txt", "zzz.txt"]);
    let cache = FileCache::new();

    let model = ListingModel::new();
    model.set_source(&cache, &Location::from_path(dir.path())).unwrap();

    let record = cache
        .get_or_create(&Location::from_path(dir.path().join("mmm.txt")), None)
        .unwrap();

    // A handler that reads the model while the change is announced must
    // find the changed record at the announced index.
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let reader = model.clone();
    model.on_rows(move |event| {
        if let RowEvent::Changed { index } = event {
            let name = reader.record_at(*index).map(|r| r.display_name());
            sink.lock().unwrap().push(name);
        }
    });

    record.rename("000.txt").unwrap();

    assert_eq!(
        *observed.lock().unwrap(),
        vec![Some("000.txt".to_string())]
    );
}

#[test]
fn insert_events_describe_the_row_at_emission_time() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["aaa", "bbb"]);
    let cache = FileCache::new();

    let model = ListingModel::new();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let reader = model.clone();
    model.on_rows(move |event| {
        if let RowEvent::Inserted { index } = event {
            let name = reader.record_at(*index).map(|r| r.display_name());
            sink.lock().unwrap().push((*index, name));
        }
    });

    // Deliberately out of sorted order: the second insert displaces the
    // first, so each event index is only valid at its own emission.
    let bbb = cache
        .get_or_create(&Location::from_path(dir.path().join("bbb")), None)
        .unwrap();
    let aaa = cache
        .get_or_create(&Location::from_path(dir.path().join("aaa")), None)
        .unwrap();
    model.members_added(&[bbb, aaa]);

    assert_eq!(
        *observed.lock().unwrap(),
        vec![
            (0, Some("bbb".to_string())),
            (0, Some("aaa".to_string())),
        ]
    );
}

#[test]
#[should_panic(expected = "not a member")]
fn removing_a_non_member_is_a_contract_violation() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["present", "stranger"]);
    let cache = FileCache::new();

    let model = ListingModel::new();
    let present = cache
        .get_or_create(&Location::from_path(dir.path().join("present")), None)
        .unwrap();
    model.members_added(&[present]);

    let stranger = cache
        .get_or_create(&Location::from_path(dir.path().join("stranger")), None)
        .unwrap();
    model.members_removed(&[stranger]);
}

#[test]
fn destroyed_member_leaves_the_listing() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["keep.txt", "gone.txt"]);
    let cache = FileCache::new();

    let model = ListingModel::new();
    model.set_source(&cache, &Location::from_path(dir.path())).unwrap();
    assert_eq!(model.visible_len(), 2);

    let record = cache
        .get_or_create(&Location::from_path(dir.path().join("gone.txt")), None)
        .unwrap();
    let events = collect_events(&model);
    record.destroy();

    assert_eq!(visible_names(&model), vec!["keep.txt"]);
    let events = events.lock().unwrap();
    assert!(matches!(events[0], RowEvent::Deleted { index: 0 }));
}

#[test]
fn rename_to_dotfile_moves_row_to_hidden_set() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["visible.txt", "other.txt"]);
    let cache = FileCache::new();

    let model = ListingModel::new();
    model.set_source(&cache, &Location::from_path(dir.path())).unwrap();

    let record = cache
        .get_or_create(&Location::from_path(dir.path().join("visible.txt")), None)
        .unwrap();
    record.rename(".visible.txt").unwrap();

    assert_eq!(visible_names(&model), vec!["other.txt"]);
    assert_eq!(model.hidden_len(), 1);

    model.set_show_hidden(true);
    assert_eq!(visible_names(&model), vec!["other.txt", ".visible.txt"]);
}

#[test]
fn custom_settings_apply_to_later_inserts() {
    let dir = tempfile::tempdir().unwrap();
    make_files(&dir, &["b", "d"]);
    let cache = FileCache::new();

    let model = ListingModel::new();
    model.set_sort(SortColumn::Name, false);
    model.set_source(&cache, &Location::from_path(dir.path())).unwrap();
    assert_eq!(visible_names(&model), vec!["d", "b"]);

    make_files(&dir, &["c"]);
    let record = cache
        .get_or_create(&Location::from_path(dir.path().join("c")), None)
        .unwrap();
    model.members_added(&[record]);
    assert_eq!(visible_names(&model), vec!["d", "c", "b"]);

    let expected = SortSettings {
        column: SortColumn::Name,
        ascending: false,
        case_sensitive: false,
        folders_first: true,
    };
    assert_eq!(model.sort_settings(), expected);
}
