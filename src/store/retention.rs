//! Generation retention.
//!
//! Keeps the newest `max_generations` generation directories and deletes the
//! rest, oldest first. Deletion stops at the first failure so the surviving
//! generations always form a contiguous, newest-first run.

use super::generation::GenerationId;
use super::SnapshotStore;
use crate::error::{Error, Result};

/// Deletes the oldest generations beyond `max_generations`.
///
/// `current` is the generation this run is writing; it is never deleted,
/// even if clock changes make it look old. Returns the deleted ids.
pub fn prune(store: &mut SnapshotStore, max_generations: usize, current: GenerationId) -> Result<Vec<GenerationId>> {
    let keep = max_generations.max(1);
    let ids = store.index().ids();
    if ids.len() <= keep {
        return Ok(Vec::new());
    }

    let excess = ids.len() - keep;
    let mut deleted = Vec::with_capacity(excess);

    for &id in &ids[..excess] {
        if id == current {
            tracing::warn!(generation = %id, "refusing to prune the generation being written");
            break;
        }

        if let Err(source) = store.delete_generation(id) {
            tracing::error!(generation = %id, "pruning stopped: {source}");
            return Err(Error::Prune {
                generation: id,
                source,
            });
        }

        tracing::debug!(generation = %id, "pruned generation");
        deleted.push(id);
    }

    if !deleted.is_empty() {
        tracing::info!(deleted = deleted.len(), kept = store.index().len(), "pruned old generations");
    }

    Ok(deleted)
}
