// SPDX-License-Identifier: LGPL-3.0-only
//! Comparators for directory listings.
//!
//! The comparison is layered: folder grouping first (unaffected by the
//! sort direction), then the selected column, then display name as the
//! tie-break for numeric columns. The configured sign flips everything
//! below the folder grouping.

use crate::filesystem::record::{FileKind, FileRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The column a listing is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    Name,
    Size,
    Type,
    ContentType,
    Permissions,
    Owner,
    Group,
    DateModified,
    DateAccessed,
}

/// The full comparator configuration of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSettings {
    pub column: SortColumn,
    pub ascending: bool,
    pub case_sensitive: bool,
    pub folders_first: bool,
}

impl Default for SortSettings {
    fn default() -> Self {
        SortSettings {
            column: SortColumn::Name,
            ascending: true,
            case_sensitive: false,
            folders_first: true,
        }
    }
}

/// Compare two records under `settings`.
pub fn compare_files(a: &FileRecord, b: &FileRecord, settings: &SortSettings) -> Ordering {
    if settings.folders_first {
        match (a.is_directory(), b.is_directory()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
    }

    let ordering = compare_by_column(a, b, settings);
    if settings.ascending {
        ordering
    } else {
        ordering.reverse()
    }
}

fn compare_by_column(a: &FileRecord, b: &FileRecord, settings: &SortSettings) -> Ordering {
    let by_name = |a: &FileRecord, b: &FileRecord| {
        compare_display_names(&a.display_name(), &b.display_name(), settings.case_sensitive)
    };

    match settings.column {
        SortColumn::Name => by_name(a, b),
        SortColumn::Size => a.size().cmp(&b.size()).then_with(|| by_name(a, b)),
        SortColumn::Type => kind_rank(a.kind())
            .cmp(&kind_rank(b.kind()))
            .then_with(|| a.content_type().cmp(&b.content_type()))
            .then_with(|| by_name(a, b)),
        SortColumn::ContentType => a
            .content_type()
            .cmp(&b.content_type())
            .then_with(|| by_name(a, b)),
        SortColumn::Permissions => a.mode().cmp(&b.mode()).then_with(|| by_name(a, b)),
        SortColumn::Owner => {
            let (ia, ib) = (a.info(), b.info());
            ia.uid.cmp(&ib.uid).then_with(|| by_name(a, b))
        }
        SortColumn::Group => {
            let (ia, ib) = (a.info(), b.info());
            ia.gid.cmp(&ib.gid).then_with(|| by_name(a, b))
        }
        SortColumn::DateModified => {
            let (ia, ib) = (a.info(), b.info());
            ia.mtime.cmp(&ib.mtime).then_with(|| by_name(a, b))
        }
        SortColumn::DateAccessed => {
            let (ia, ib) = (a.info(), b.info());
            ia.atime.cmp(&ib.atime).then_with(|| by_name(a, b))
        }
    }
}

fn kind_rank(kind: FileKind) -> u8 {
    match kind {
        FileKind::Directory => 0,
        FileKind::Regular => 1,
        FileKind::Symlink => 2,
        FileKind::Other => 3,
    }
}

/// Compare two display names with number-aware ordering.
///
/// Leading dots are ignored, so hidden files interleave with their
/// visible counterparts the way locale collation places them. Names are
/// then compared character by character (case-folded unless
/// `case_sensitive`). When the first difference falls on digits in both
/// names, the digit runs are compared by numeric value so `file9` sorts
/// before `file10`. A difference directly after a digit in both names
/// (`2file` vs `20 file`) re-anchors the numeric comparison one character
/// back. Numerically equal runs put the larger leading digit first, so
/// `file10` comes before `file010`.
pub fn compare_display_names(a: &str, b: &str, case_sensitive: bool) -> Ordering {
    let a_stem = a.trim_start_matches('.');
    let b_stem = b.trim_start_matches('.');
    compare_name_stems(a_stem, b_stem, case_sensitive).then_with(|| {
        // Equal stems: the dotted variant first, matching byte order.
        let a_dots = a.len() - a_stem.len();
        let b_dots = b.len() - b_stem.len();
        b_dots.cmp(&a_dots)
    })
}

fn compare_name_stems(a: &str, b: &str, case_sensitive: bool) -> Ordering {
    let mut a_iter = a.char_indices();
    let mut b_iter = b.char_indices();

    loop {
        let (a_next, b_next) = (a_iter.next(), b_iter.next());
        let ((a_pos, a_ch), (b_pos, b_ch)) = match (a_next, b_next) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a), Some(b)) => (a, b),
        };

        let (a_key, b_key) = if case_sensitive {
            (a_ch, b_ch)
        } else {
            (fold(a_ch), fold(b_ch))
        };
        if a_key == b_key {
            continue;
        }

        if a_ch.is_ascii_digit() || b_ch.is_ascii_digit() {
            if a_ch.is_ascii_digit() && b_ch.is_ascii_digit() {
                return compare_digit_runs(&a[a_pos..], &b[b_pos..]);
            }
            // The '2file' vs '20 file' case: the character before the
            // difference is a digit in both names.
            if a_pos > 0
                && b_pos > 0
                && a.as_bytes()[a_pos - 1].is_ascii_digit()
                && b.as_bytes()[b_pos - 1].is_ascii_digit()
            {
                return compare_digit_runs(&a[a_pos - 1..], &b[b_pos - 1..]);
            }
        }

        return a_key.cmp(&b_key);
    }
}

fn fold(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

/// Compare the leading digit runs of `a` and `b` by numeric value.
///
/// Zero stripping plus length-then-lexicographic comparison gives the
/// numeric ordering without an integer width limit. Equal values are
/// disambiguated by the leading digit, larger first.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_run = leading_digits(a);
    let b_run = leading_digits(b);

    let a_value = a_run.trim_start_matches('0');
    let b_value = b_run.trim_start_matches('0');
    let by_value = a_value
        .len()
        .cmp(&b_value.len())
        .then_with(|| a_value.cmp(b_value));
    if by_value != Ordering::Equal {
        return by_value;
    }

    b_run.as_bytes()[0].cmp(&a_run.as_bytes()[0])
}

fn leading_digits(s: &str) -> &str {
    let end = s
        .as_bytes()
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(s.len());
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut names: Vec<&str>, case_sensitive: bool) -> Vec<&str> {
        names.sort_by(|a, b| compare_display_names(a, b, case_sensitive));
        names
    }

    #[test]
    fn numeric_runs_compare_by_value() {
        assert_eq!(
            sorted(vec!["file10", "file2", "file9"], true),
            vec!["file2", "file9", "file10"]
        );
    }

    #[test]
    fn zero_padded_equal_values_put_larger_leading_digit_first() {
        assert_eq!(
            compare_display_names("file10", "file010", true),
            Ordering::Less
        );
        assert_eq!(
            compare_display_names("file010", "file10", true),
            Ordering::Greater
        );
    }

    #[test]
    fn difference_after_shared_digit_reanchors() {
        // '2file' vs '20 file': the difference is at 'f' vs '0', but both
        // previous characters are digits, so 2 < 20 decides.
        assert_eq!(
            compare_display_names("2file", "20 file", true),
            Ordering::Less
        );
    }

    #[test]
    fn case_folding_only_when_insensitive() {
        assert_eq!(compare_display_names("Abc", "abc", false), Ordering::Equal);
        assert_ne!(compare_display_names("Abc", "abc", true), Ordering::Equal);
    }

    #[test]
    fn plain_lexicographic_otherwise() {
        assert_eq!(sorted(vec!["b", "a", "c"], true), vec!["a", "b", "c"]);
        assert_eq!(compare_display_names("abc", "abcd", true), Ordering::Less);
    }

    #[test]
    fn leading_dots_are_ignored() {
        assert_eq!(
            sorted(vec![".hidden", "A", "b.txt"], false),
            vec!["A", "b.txt", ".hidden"]
        );
        // Equal stems put the dotted variant first.
        assert_eq!(compare_display_names(".foo", "foo", true), Ordering::Less);
    }

    #[test]
    fn huge_numbers_do_not_overflow() {
        assert_eq!(
            compare_display_names(
                "f99999999999999999999999999999",
                "f100000000000000000000000000000",
                true
            ),
            Ordering::Less
        );
    }
}
