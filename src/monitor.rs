//! Run orchestration.
//!
//! For each configured root: load the baseline, scan (or replay a saved
//! snapshot), persist, diff. Then the same for free space, then prune old
//! generations. Roots are processed one at a time, to completion.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::error::Error;
use crate::platform;
use crate::scan::{DirectorySummary, Scanner};
use crate::store::diff::{aggregate_delta, diff_details, Change, SummaryDelta};
use crate::store::generation::{GenerationId, GenerationIndex};
use crate::store::{retention, SavedSnapshot, SnapshotStore};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Rebuild the report from saved generations instead of scanning.
    pub replay: bool,
    /// How far back the comparison is shifted (0 = newest).
    pub steps_back: usize,
    /// Read-only run: nothing is written or pruned.
    pub no_save: bool,
}

impl RunOptions {
    pub fn persists(&self) -> bool {
        !self.replay && !self.no_save
    }

    /// Steps back to the baseline. When replaying, the "current" side is
    /// itself a saved generation, so the baseline sits one further back.
    fn baseline_steps(&self) -> usize {
        if self.replay {
            self.steps_back.saturating_add(1)
        } else {
            self.steps_back
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DirectoryReport {
    #[serde(serialize_with = "crate::path_serde::serialize")]
    pub root: PathBuf,
    pub summary: Option<DirectorySummary>,
    pub baseline: Option<GenerationId>,
    pub delta: Option<SummaryDelta>,
    pub changes: Vec<Change>,
    pub walk_ms: Option<u64>,
    pub save_ms: Option<u64>,
    pub skipped: u64,
    pub error: Option<String>,
}

impl DirectoryReport {
    fn new(root: &Path) -> Self {
        DirectoryReport {
            root: root.to_path_buf(),
            summary: None,
            baseline: None,
            delta: None,
            changes: Vec::new(),
            walk_ms: None,
            save_ms: None,
            skipped: 0,
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FreeSpaceReport {
    pub free_bytes: u64,
    pub baseline: Option<GenerationId>,
    pub delta: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    /// Generation written by this run, or the one replayed.
    pub generation: Option<GenerationId>,
    /// Generation compared against.
    pub previous_generation: Option<GenerationId>,
    pub replay: bool,
    pub detailed: bool,
    pub directories: Vec<DirectoryReport>,
    pub free_space: Option<FreeSpaceReport>,
    pub pruned: Vec<GenerationId>,
    pub elapsed_ms: u64,
    pub resident_memory_bytes: Option<u64>,
}

fn millis(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub struct Monitor<'a> {
    config: &'a Config,
    store: &'a mut SnapshotStore,
    scanner: Scanner,
}

impl<'a> Monitor<'a> {
    pub fn new(config: &'a Config, store: &'a mut SnapshotStore) -> Self {
        Monitor {
            config,
            store,
            scanner: Scanner::from_config(config),
        }
    }

    pub fn run(&mut self, options: RunOptions) -> RunReport {
        self.run_at(options, Utc::now())
    }

    /// Runs as if started at `started_at`, which names the generation written.
    pub fn run_at(&mut self, options: RunOptions, started_at: DateTime<Utc>) -> RunReport {
        let start = Instant::now();
        let this_run = GenerationId::new(started_at);
        let (generation, previous_generation) = self.compared_generations(this_run, options);

        if options.persists() {
            if let Err(e) = self.store.begin_generation(this_run) {
                tracing::error!("cannot create generation {this_run}: {e}");
            }
        }

        let roots = self.config.roots();
        let directories = roots
            .iter()
            .map(|root| self.process_root(root, this_run, started_at, options))
            .collect();

        let free_space = self.process_free_space(this_run, options);

        let pruned = if options.persists() {
            // failures are logged inside prune, nothing more to do here
            retention::prune(self.store, self.config.max_snapshots, this_run).unwrap_or_default()
        } else {
            Vec::new()
        };

        RunReport {
            started_at,
            generation,
            previous_generation,
            replay: options.replay,
            detailed: self.scanner.detailed(),
            directories,
            free_space,
            pruned,
            elapsed_ms: millis(start),
            resident_memory_bytes: memory_stats::memory_stats().map(|m| m.physical_mem as u64),
        }
    }

    fn compared_generations(
        &self,
        this_run: GenerationId,
        options: RunOptions,
    ) -> (Option<GenerationId>, Option<GenerationId>) {
        let ids: Vec<GenerationId> = self
            .store
            .index()
            .iter()
            .map(|g| g.id)
            .filter(|id| options.replay || *id < this_run)
            .collect();

        let current = if options.replay {
            GenerationIndex::select(&ids, options.steps_back)
        } else if options.persists() {
            Some(this_run)
        } else {
            None
        };

        (current, GenerationIndex::select(&ids, options.baseline_steps()))
    }

    fn process_root(
        &mut self,
        root: &Path,
        this_run: GenerationId,
        started_at: DateTime<Utc>,
        options: RunOptions,
    ) -> DirectoryReport {
        let _span = tracing::info_span!("root", path = %root.display()).entered();
        let mut report = DirectoryReport::new(root);
        let detailed = self.scanner.detailed();

        let baseline = self.load_baseline(root, options.baseline_steps(), detailed);
        report.baseline = baseline.as_ref().map(|b| b.generation);

        let (summary, detail) = if options.replay {
            match self.store.load_previous(root, options.steps_back, detailed) {
                Ok(saved) => (saved.summary, saved.detail),
                Err(e) => {
                    if e.is_missing_baseline() {
                        tracing::info!("nothing saved to replay: {e}");
                    } else {
                        tracing::error!("failed to load saved snapshot: {e}");
                    }
                    report.error = Some(e.to_string());
                    return report;
                }
            }
        } else {
            match self.scanner.scan(root, started_at) {
                Ok(outcome) => {
                    report.walk_ms = Some(u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX));
                    report.skipped = outcome.skipped;
                    (outcome.summary, outcome.detail)
                }
                Err(e) => {
                    tracing::error!("scan failed: {e}");
                    report.error = Some(e.to_string());
                    return report;
                }
            }
        };

        if options.persists() {
            let save_start = Instant::now();
            match self.store.save(this_run, &summary, detail.as_ref()) {
                Ok(()) => report.save_ms = Some(millis(save_start)),
                Err(e) => {
                    tracing::error!("failed to save snapshot: {e}");
                    report.error = Some(format!("not saved: {e}"));
                }
            }
        }

        report.delta = aggregate_delta(baseline.as_ref().map(|b| &b.summary), &summary);
        report.changes = match (baseline.and_then(|b| b.detail), detail) {
            (Some(previous), Some(current)) => diff_details(&previous, &current),
            _ => Vec::new(),
        };
        report.summary = Some(summary);
        report
    }

    /// Missing history is normal (first run, short history) and yields `None`.
    fn load_baseline(&self, root: &Path, steps_back: usize, detailed: bool) -> Option<SavedSnapshot> {
        match self.store.load_previous(root, steps_back, detailed) {
            Ok(saved) => Some(saved),
            Err(e) if e.is_missing_baseline() => {
                tracing::info!("no baseline to compare against, is it the first run? ({e})");
                None
            }
            Err(e) => {
                tracing::error!("failed to load baseline: {e}");
                None
            }
        }
    }

    fn process_free_space(&mut self, this_run: GenerationId, options: RunOptions) -> Option<FreeSpaceReport> {
        let baseline = match self.store.load_previous_free_space(options.baseline_steps()) {
            Ok(found) => Some(found),
            Err(e) => {
                log_free_space_error(&e, "no free space baseline");
                None
            }
        };

        let current = if options.replay {
            self.store.load_previous_free_space(options.steps_back).map(|(bytes, _)| bytes)
        } else {
            platform::free_space(self.store.data_root())
        };

        let free_bytes = match current {
            Ok(bytes) => bytes,
            Err(e) => {
                log_free_space_error(&e, "free space unavailable");
                return None;
            }
        };

        if options.persists() {
            if let Err(e) = self.store.save_free_space(this_run, free_bytes) {
                tracing::error!("failed to save free space: {e}");
            }
        }

        Some(FreeSpaceReport {
            free_bytes,
            baseline: baseline.map(|(_, id)| id),
            delta: baseline
                .filter(|(bytes, _)| *bytes != 0)
                .map(|(bytes, _)| signed(free_bytes).saturating_sub(signed(bytes))),
        })
    }
}

fn log_free_space_error(e: &Error, context: &str) {
    if e.is_missing_baseline() {
        tracing::info!("{context}: {e}");
    } else {
        tracing::error!("{context}: {e}");
    }
}
