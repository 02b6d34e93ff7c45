//! Snapshot comparison engine.
//!
//! Compares two generations of one root:
//! - aggregate deltas (size, dirs, files) between two summaries
//! - per-path changes between two detail maps: added, modified, deleted
//!
//! An empty or missing baseline never produces changes, so a first run does
//! not report the whole tree as new.

use std::path::PathBuf;

use serde::Serialize;

use crate::scan::detail::{DetailMap, FileDetail};
use crate::scan::DirectorySummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    #[serde(serialize_with = "crate::path_serde::serialize")]
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub is_dir: bool,
    /// Size after the change, or before it for deletions.
    pub size: u64,
    pub delta: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SummaryDelta {
    pub size: i64,
    pub dirs: i64,
    pub files: i64,
}

impl SummaryDelta {
    pub fn is_unchanged(&self) -> bool {
        *self == SummaryDelta::default()
    }
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Aggregate delta against `previous`. `None` means there is nothing to
/// compare with, which is different from a zero delta.
pub fn aggregate_delta(
    previous: Option<&DirectorySummary>,
    current: &DirectorySummary,
) -> Option<SummaryDelta> {
    let previous = previous.filter(|p| !p.is_empty())?;

    Some(SummaryDelta {
        size: signed(current.size).saturating_sub(signed(previous.size)),
        dirs: signed(current.dirs).saturating_sub(signed(previous.dirs)),
        files: signed(current.files).saturating_sub(signed(previous.files)),
    })
}

fn added(path: &PathBuf, detail: &FileDetail) -> Change {
    Change {
        path: path.clone(),
        kind: ChangeKind::Added,
        is_dir: detail.is_dir,
        size: detail.size,
        delta: signed(detail.size),
    }
}

fn deleted(path: &PathBuf, detail: &FileDetail) -> Change {
    Change {
        path: path.clone(),
        kind: ChangeKind::Deleted,
        is_dir: detail.is_dir,
        size: detail.size,
        delta: -signed(detail.size),
    }
}

/// Per-path changes from `previous` to `current`, sorted by path.
///
/// A path whose type flipped between file and directory is reported as a
/// deletion of the old entry followed by an addition of the new one.
pub fn diff_details(previous: &DetailMap, current: &DetailMap) -> Vec<Change> {
    if previous.is_empty() {
        return Vec::new();
    }

    let mut changes = Vec::new();

    for (path, old) in previous {
        match current.get(path) {
            None => changes.push(deleted(path, old)),
            Some(new) if new.is_dir != old.is_dir => {
                changes.push(deleted(path, old));
                changes.push(added(path, new));
            }
            Some(new) if new.size != old.size => changes.push(Change {
                path: path.clone(),
                kind: ChangeKind::Modified,
                is_dir: new.is_dir,
                size: new.size,
                delta: signed(new.size).saturating_sub(signed(old.size)),
            }),
            Some(_) => {}
        }
    }

    for (path, new) in current {
        if !previous.contains_key(path) {
            changes.push(added(path, new));
        }
    }

    // stable sort keeps deleted-before-added for retyped paths
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

/// Net byte change over file entries. Directory entries are left out since
/// their sizes already include the files beneath them.
pub fn net_change(changes: &[Change]) -> i64 {
    changes
        .iter()
        .filter(|c| !c.is_dir)
        .fold(0i64, |net, c| net.saturating_add(c.delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn map(entries: &[(&str, u64)]) -> DetailMap {
        entries
            .iter()
            .map(|(p, size)| (PathBuf::from(p), FileDetail::file(*size)))
            .collect()
    }

    fn summary(size: u64, dirs: u64, files: u64) -> DirectorySummary {
        DirectorySummary {
            size,
            dirs,
            files,
            ..DirectorySummary::new(PathBuf::from("/r"), Utc::now())
        }
    }

    #[test]
    fn added_entry_detected() {
        let changes = diff_details(&map(&[("/r/a", 1)]), &map(&[("/r/a", 1), ("/r/b", 1_000)]));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert_eq!(changes[0].size, 1_000);
        assert_eq!(changes[0].delta, 1_000);
    }

    #[test]
    fn deleted_entry_detected() {
        let changes = diff_details(&map(&[("/r/a", 1), ("/r/b", 1_000)]), &map(&[("/r/a", 1)]));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Deleted);
        assert_eq!(changes[0].size, 1_000);
        assert_eq!(changes[0].delta, -1_000);
    }

    #[test]
    fn modified_entry_carries_signed_delta() {
        let changes = diff_details(&map(&[("/r/a", 3_000)]), &map(&[("/r/a", 1_000)]));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].size, 1_000);
        assert_eq!(changes[0].delta, -2_000);
    }

    #[test]
    fn unchanged_entry_not_reported() {
        assert!(diff_details(&map(&[("/r/a", 5)]), &map(&[("/r/a", 5)])).is_empty());
    }

    #[test]
    fn empty_baseline_reports_nothing() {
        let current = map(&[("/r/a", 5), ("/r/b", 7)]);
        assert!(diff_details(&DetailMap::new(), &current).is_empty());
    }

    #[test]
    fn everything_deleted_is_reported() {
        let changes = diff_details(&map(&[("/r/a", 5), ("/r/b", 7)]), &DetailMap::new());
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Deleted));
    }

    #[test]
    fn changes_sorted_by_path() {
        let previous = map(&[("/r/m", 1), ("/r/z", 1), ("/r/b", 1)]);
        let current = map(&[("/r/m", 2), ("/r/a", 1), ("/r/y", 1)]);
        let paths: Vec<_> = diff_details(&previous, &current)
            .into_iter()
            .map(|c| c.path)
            .collect();
        assert_eq!(
            paths,
            ["/r/a", "/r/b", "/r/m", "/r/y", "/r/z"].map(PathBuf::from).to_vec()
        );
    }

    #[test]
    fn classification_is_complete_and_exclusive() {
        let previous = map(&[("/r/same", 1), ("/r/grew", 2), ("/r/gone", 3)]);
        let current = map(&[("/r/same", 1), ("/r/grew", 20), ("/r/new", 4)]);
        let changes = diff_details(&previous, &current);

        for path in previous.keys().chain(current.keys()) {
            let hits: Vec<_> = changes.iter().filter(|c| &c.path == path).collect();
            let expected = match (previous.get(path), current.get(path)) {
                (None, Some(_)) => Some(ChangeKind::Added),
                (Some(_), None) => Some(ChangeKind::Deleted),
                (Some(a), Some(b)) if a.size != b.size => Some(ChangeKind::Modified),
                _ => None,
            };
            assert_eq!(hits.first().map(|c| c.kind), expected, "{}", path.display());
            assert!(hits.len() <= 1);
        }
    }

    #[test]
    fn retyped_path_is_deleted_then_added() {
        let previous = map(&[("/r/x", 10), ("/r/keep", 1)]);
        let mut current = map(&[("/r/keep", 1)]);
        current.insert(PathBuf::from("/r/x"), FileDetail { is_dir: true, size: 10 });

        let changes = diff_details(&previous, &current);
        let kinds: Vec<_> = changes.iter().map(|c| (c.kind, c.is_dir)).collect();
        assert_eq!(
            kinds,
            vec![(ChangeKind::Deleted, false), (ChangeKind::Added, true)]
        );
    }

    #[test]
    fn net_change_skips_directories() {
        let mut previous = map(&[("/r/b", 50)]);
        previous.insert(PathBuf::from("/r"), FileDetail { is_dir: true, size: 50 });
        let mut current = map(&[("/r/d", 10)]);
        current.insert(PathBuf::from("/r"), FileDetail { is_dir: true, size: 10 });

        let changes = diff_details(&previous, &current);
        assert_eq!(changes.len(), 3);
        assert_eq!(net_change(&changes), -40);
    }

    #[test]
    fn aggregate_delta_requires_baseline() {
        assert_eq!(aggregate_delta(None, &summary(10, 1, 1)), None);
        assert_eq!(aggregate_delta(Some(&summary(0, 0, 0)), &summary(10, 1, 1)), None);
    }

    #[test]
    fn aggregate_delta_is_signed_difference() {
        let delta = aggregate_delta(Some(&summary(175, 1, 3)), &summary(135, 1, 3)).unwrap();
        assert_eq!(delta, SummaryDelta { size: -40, dirs: 0, files: 0 });
        assert!(!delta.is_unchanged());

        let same = aggregate_delta(Some(&summary(5, 1, 1)), &summary(5, 1, 1)).unwrap();
        assert!(same.is_unchanged());
    }
}
