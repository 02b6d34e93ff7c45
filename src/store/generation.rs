//! Generation identity and the in-memory index of saved generations.
//!
//! A generation is a directory under the data root named after the UTC time
//! the run started. The name format is fixed width so that sorting names as
//! strings and sorting them as times agree.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DIR_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GenerationId(DateTime<Utc>);

impl GenerationId {
    /// Truncates to whole seconds, the resolution of the directory name.
    pub fn new(at: DateTime<Utc>) -> Self {
        GenerationId(at.trunc_subsecs(0))
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn dir_name(&self) -> String {
        self.0.format(DIR_FORMAT).to_string()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGenerationError(String);

impl fmt::Display for ParseGenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a generation name", self.0)
    }
}

impl std::error::Error for ParseGenerationError {}

impl FromStr for GenerationId {
    type Err = ParseGenerationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // chrono accepts some non-padded fields, require the exact width so
        // only names we could have produced are indexed
        if s.len() != "0000-00-00_00-00-00".len() {
            return Err(ParseGenerationError(s.to_string()));
        }
        NaiveDateTime::parse_from_str(s, DIR_FORMAT)
            .map(|naive| GenerationId(naive.and_utc()))
            .map_err(|_| ParseGenerationError(s.to_string()))
    }
}

/// One generation directory and the artifact file names it held when indexed.
#[derive(Debug, Clone)]
pub struct Generation {
    pub id: GenerationId,
    pub artifacts: BTreeSet<String>,
}

impl Generation {
    pub fn contains(&self, artifact: &str) -> bool {
        self.artifacts.contains(artifact)
    }
}

/// Sorted (oldest first) view of every generation under a data root.
///
/// Built once from disk, then kept current by the store as it saves and
/// prunes, so lookups never rescan the filesystem.
#[derive(Debug, Default)]
pub struct GenerationIndex {
    generations: Vec<Generation>,
}

impl GenerationIndex {
    pub fn build(data_root: &Path) -> Result<Self> {
        let mut generations = Vec::new();

        let entries = std::fs::read_dir(data_root).map_err(|e| Error::io(data_root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(data_root, e))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.parse::<GenerationId>().ok()) else {
                tracing::debug!(entry = %entry.path().display(), "ignoring non-generation entry");
                continue;
            };

            let artifacts = match list_artifacts(&entry.path()) {
                Ok(artifacts) => artifacts,
                Err(e) => {
                    tracing::warn!("skipping unreadable generation {id}: {e}");
                    continue;
                }
            };

            generations.push(Generation { id, artifacts });
        }

        generations.sort_by_key(|g| g.id);
        Ok(GenerationIndex { generations })
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// All generations, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Generation> {
        self.generations.iter()
    }

    pub fn ids(&self) -> Vec<GenerationId> {
        self.generations.iter().map(|g| g.id).collect()
    }

    pub fn get(&self, id: GenerationId) -> Option<&Generation> {
        self.position(id).ok().map(|i| &self.generations[i])
    }

    /// Generations (oldest first) that hold `artifact`.
    pub fn holding(&self, artifact: &str) -> Vec<GenerationId> {
        self.generations
            .iter()
            .filter(|g| g.contains(artifact))
            .map(|g| g.id)
            .collect()
    }

    /// Picks the entry `steps_back` places before the newest one.
    pub fn select(ids: &[GenerationId], steps_back: usize) -> Option<GenerationId> {
        let index = ids.len().checked_sub(1)?.checked_sub(steps_back)?;
        ids.get(index).copied()
    }

    pub(crate) fn insert_generation(&mut self, id: GenerationId) {
        if let Err(index) = self.position(id) {
            self.generations.insert(
                index,
                Generation {
                    id,
                    artifacts: BTreeSet::new(),
                },
            );
        }
    }

    pub(crate) fn record_artifact(&mut self, id: GenerationId, artifact: &str) {
        self.insert_generation(id);
        if let Ok(index) = self.position(id) {
            self.generations[index].artifacts.insert(artifact.to_string());
        }
    }

    pub(crate) fn remove(&mut self, id: GenerationId) {
        if let Ok(index) = self.position(id) {
            self.generations.remove(index);
        }
    }

    fn position(&self, id: GenerationId) -> std::result::Result<usize, usize> {
        self.generations.binary_search_by_key(&id, |g| g.id)
    }
}

fn list_artifacts(dir: &Path) -> std::io::Result<BTreeSet<String>> {
    let mut artifacts = BTreeSet::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            // half written files from an interrupted save
            if !name.ends_with(".tmp") {
                artifacts.insert(name.to_string());
            }
        }
    }
    Ok(artifacts)
}
