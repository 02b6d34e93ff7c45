use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDetail {
    pub is_dir: bool,
    /// Own size for files; sum of all descendant files for directories.
    pub size: u64,
}

impl FileDetail {
    pub fn file(size: u64) -> Self {
        FileDetail { is_dir: false, size }
    }

    pub fn dir() -> Self {
        FileDetail { is_dir: true, size: 0 }
    }
}

/// Absolute path to detail, ordered by path so iteration is deterministic.
pub type DetailMap = BTreeMap<PathBuf, FileDetail>;

/// Builds the detail map from raw walk entries.
///
/// Entries are collected first and sizes propagated afterwards: every file's
/// size is credited to each directory entry between it and `root`
/// (inclusive). Directories that failed to list are simply absent, their
/// ancestors are still credited.
pub fn build_detail_map(root: &Path, entries: impl IntoIterator<Item = (PathBuf, FileDetail)>) -> DetailMap {
    let mut map: DetailMap = entries
        .into_iter()
        .filter(|(path, _)| path.starts_with(root))
        .map(|(path, detail)| {
            let detail = if detail.is_dir { FileDetail::dir() } else { detail };
            (path, detail)
        })
        .collect();

    propagate_sizes(root, &mut map);
    map
}

fn propagate_sizes(root: &Path, map: &mut DetailMap) {
    let files: Vec<(PathBuf, u64)> = map
        .iter()
        .filter(|(_, d)| !d.is_dir && d.size > 0)
        .map(|(p, d)| (p.clone(), d.size))
        .collect();

    for (path, size) in files {
        for ancestor in path.ancestors().skip(1) {
            if !ancestor.starts_with(root) {
                break;
            }
            if let Some(detail) = map.get_mut(ancestor) {
                if detail.is_dir {
                    detail.size = detail.size.saturating_add(size);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn sizes_roll_up_to_root() {
        let map = build_detail_map(
            Path::new("/r"),
            vec![
                (p("/r"), FileDetail::dir()),
                (p("/r/a"), FileDetail::file(100)),
                (p("/r/sub"), FileDetail::dir()),
                (p("/r/sub/c"), FileDetail::file(25)),
                (p("/r/sub/deep"), FileDetail::dir()),
                (p("/r/sub/deep/e"), FileDetail::file(5)),
            ],
        );

        assert_eq!(map[&p("/r")].size, 130);
        assert_eq!(map[&p("/r/sub")].size, 30);
        assert_eq!(map[&p("/r/sub/deep")].size, 5);
        assert_eq!(map[&p("/r/a")].size, 100);
    }

    #[test]
    fn propagation_does_not_depend_on_entry_order() {
        let entries = vec![
            (p("/r/sub/c"), FileDetail::file(25)),
            (p("/r/sub"), FileDetail::dir()),
            (p("/r/a"), FileDetail::file(100)),
            (p("/r"), FileDetail::dir()),
        ];
        let mut reversed = entries.clone();
        reversed.reverse();

        assert_eq!(
            build_detail_map(Path::new("/r"), entries),
            build_detail_map(Path::new("/r"), reversed)
        );
    }

    #[test]
    fn missing_intermediate_directory_still_credits_root() {
        let map = build_detail_map(
            Path::new("/r"),
            vec![(p("/r"), FileDetail::dir()), (p("/r/locked/x"), FileDetail::file(7))],
        );
        assert_eq!(map[&p("/r")].size, 7);
        assert!(!map.contains_key(&p("/r/locked")));
    }

    #[test]
    fn paths_outside_root_are_dropped() {
        let map = build_detail_map(
            Path::new("/r"),
            vec![(p("/r"), FileDetail::dir()), (p("/elsewhere/x"), FileDetail::file(9))],
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map[&p("/r")].size, 0);
    }

    #[test]
    fn every_directory_equals_sum_of_descendant_files() {
        let map = build_detail_map(
            Path::new("/r"),
            vec![
                (p("/r"), FileDetail::dir()),
                (p("/r/x"), FileDetail::dir()),
                (p("/r/x/1"), FileDetail::file(3)),
                (p("/r/x/y"), FileDetail::dir()),
                (p("/r/x/y/2"), FileDetail::file(11)),
                (p("/r/z"), FileDetail::dir()),
                (p("/r/3"), FileDetail::file(13)),
            ],
        );

        for (dir, detail) in map.iter().filter(|(_, d)| d.is_dir) {
            let expected: u64 = map
                .iter()
                .filter(|(path, d)| !d.is_dir && path.starts_with(dir))
                .map(|(_, d)| d.size)
                .sum();
            assert_eq!(detail.size, expected, "{}", dir.display());
        }
    }
}
