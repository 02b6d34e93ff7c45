pub mod detail;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use detail::{build_detail_map, DetailMap, FileDetail};

/// Aggregate state of one root at one point in time. Never mutated after the
/// walk that produced it finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySummary {
    #[serde(with = "crate::path_serde")]
    pub path: PathBuf,
    pub size: u64,
    pub files: u64,
    pub dirs: u64,
    /// Newest modification time seen, ignoring timestamps in the future.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
}

impl DirectorySummary {
    pub fn new(path: PathBuf, started_at: DateTime<Utc>) -> Self {
        DirectorySummary {
            path,
            size: 0,
            files: 0,
            dirs: 0,
            mtime: None,
            started_at,
        }
    }

    /// A summary with nothing counted. Used as a baseline it must not
    /// produce deltas.
    pub fn is_empty(&self) -> bool {
        self.size == 0 && self.files == 0 && self.dirs == 0
    }
}

pub struct ScanOutcome {
    pub summary: DirectorySummary,
    pub detail: Option<DetailMap>,
    /// Entries that could not be read and were left out of the totals.
    pub skipped: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner {
    detailed: bool,
    count_root_dir: bool,
}

impl Scanner {
    pub fn new(detailed: bool, count_root_dir: bool) -> Self {
        Scanner {
            detailed,
            count_root_dir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.detailed_mode, config.count_root_dir)
    }

    pub fn detailed(&self) -> bool {
        self.detailed
    }

    /// Walks `root` and summarizes it.
    ///
    /// Only an unreadable root is an error. Anything below it that fails is
    /// logged, counted in `skipped` and left out.
    pub fn scan(&self, root: &Path, started_at: DateTime<Utc>) -> Result<ScanOutcome> {
        std::fs::symlink_metadata(root).map_err(|source| Error::RootUnavailable {
            path: root.to_path_buf(),
            source,
        })?;

        let start = Instant::now();
        let mut summary = DirectorySummary::new(root.to_path_buf(), started_at);
        let mut entries: Vec<(PathBuf, FileDetail)> = Vec::new();
        let mut skipped = 0u64;
        let mut latest: Option<SystemTime> = None;

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    tracing::warn!(path = %path, "skipping entry: {e}");
                    skipped += 1;
                    continue;
                }
            };

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), "skipping entry: {e}");
                    skipped += 1;
                    continue;
                }
            };

            if let Ok(modified) = metadata.modified() {
                // clock-skewed entries from the future would pin the max forever
                if modified <= SystemTime::now() && latest.map_or(true, |l| modified > l) {
                    latest = Some(modified);
                }
            }

            let is_dir = entry.file_type().is_dir();
            if is_dir {
                if entry.depth() > 0 || self.count_root_dir {
                    summary.dirs += 1;
                }
            } else {
                summary.files += 1;
                summary.size = summary.size.saturating_add(metadata.len());
            }

            if self.detailed {
                let detail = if is_dir {
                    FileDetail::dir()
                } else {
                    FileDetail::file(metadata.len())
                };
                entries.push((entry.into_path(), detail));
            }
        }

        summary.mtime = latest.map(DateTime::<Utc>::from);
        let detail = self.detailed.then(|| build_detail_map(root, entries));

        let elapsed = start.elapsed();
        tracing::debug!(
            root = %root.display(),
            files = summary.files,
            dirs = summary.dirs,
            size = summary.size,
            skipped,
            elapsed_ms = elapsed.as_millis() as u64,
            "scan complete"
        );

        Ok(ScanOutcome {
            summary,
            detail,
            skipped,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        fs::write(root.join("a"), vec![0u8; 100]).unwrap();
        fs::write(root.join("b"), vec![0u8; 50]).unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("c"), vec![0u8; 25]).unwrap();
        (tmp, root)
    }

    #[test]
    fn counts_files_dirs_and_size() {
        let (_tmp, root) = fixture();
        let outcome = Scanner::new(false, false).scan(&root, Utc::now()).unwrap();

        assert_eq!(outcome.summary.size, 175);
        assert_eq!(outcome.summary.files, 3);
        assert_eq!(outcome.summary.dirs, 1);
        assert_eq!(outcome.summary.path, root);
        assert!(outcome.detail.is_none());
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn root_counted_when_configured() {
        let (_tmp, root) = fixture();
        let outcome = Scanner::new(false, true).scan(&root, Utc::now()).unwrap();
        assert_eq!(outcome.summary.dirs, 2);
    }

    #[test]
    fn detail_map_propagates_to_root() {
        let (_tmp, root) = fixture();
        let outcome = Scanner::new(true, false).scan(&root, Utc::now()).unwrap();
        let detail = outcome.detail.unwrap();

        assert_eq!(detail.len(), 5);
        assert_eq!(detail[&root], FileDetail { is_dir: true, size: 175 });
        assert_eq!(detail[&root.join("sub")], FileDetail { is_dir: true, size: 25 });
        assert_eq!(detail[&root.join("b")], FileDetail::file(50));
        assert!(detail.keys().all(|p| p.starts_with(&root)));
    }

    #[test]
    fn future_mtime_is_ignored_but_counted() {
        let (_tmp, root) = fixture();
        let future = SystemTime::now() + Duration::from_secs(60 * 60 * 24 * 365);
        let file = fs::File::options().write(true).open(root.join("a")).unwrap();
        file.set_modified(future).unwrap();
        drop(file);

        let outcome = Scanner::new(false, false).scan(&root, Utc::now()).unwrap();
        let mtime = outcome.summary.mtime.expect("directories have mtimes");

        assert!(mtime <= Utc::now());
        assert_eq!(outcome.summary.files, 3);
        assert_eq!(outcome.summary.size, 175);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Scanner::default()
            .scan(&tmp.path().join("gone"), Utc::now())
            .err()
            .unwrap();
        assert!(matches!(err, Error::RootUnavailable { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subtree_is_skipped_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, root) = fixture();
        let locked = root.join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden"), vec![0u8; 10]).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores permission bits, nothing to observe then
        let readable_anyway = fs::read_dir(&locked).is_ok();
        let outcome = Scanner::new(false, false).scan(&root, Utc::now()).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if !readable_anyway {
            assert_eq!(outcome.summary.size, 175);
            assert_eq!(outcome.summary.dirs, 2);
            assert_eq!(outcome.skipped, 1);
        }
    }
}
