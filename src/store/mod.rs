//! Generation-indexed snapshot storage.
//!
//! Layout under the data root:
//! - `<generation>/summary-<hash>.toml`: one summary per monitored root
//! - `<generation>/detail-<hash>.bin`: per-path sizes, detailed mode only
//! - `<generation>/free-space.toml`: free bytes on the data volume
//!
//! `<hash>` identifies a root by its absolute path so arbitrary path
//! characters never end up in file names.

pub mod diff;
pub mod generation;
pub mod retention;

use std::fs;
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::platform;
use crate::scan::detail::{DetailMap, FileDetail};
use crate::scan::DirectorySummary;
use generation::{GenerationId, GenerationIndex};

pub const FREE_SPACE_FILE: &str = "free-space.toml";

/// Upper bound on a detail payload we are willing to decode. A corrupt
/// length prefix should fail the load, not exhaust memory.
const DETAIL_PAYLOAD_LIMIT_BYTES: u64 = 512 * 1024 * 1024;

/// Stable, filename-safe key for a root: hex of the first 10 bytes of the
/// SHA-256 of its raw path bytes.
pub fn root_key(root: &Path) -> String {
    let digest = Sha256::digest(platform::path_bytes(root));
    hex::encode(&digest[..10])
}

pub fn summary_file_name(root: &Path) -> String {
    format!("summary-{}.toml", root_key(root))
}

pub fn detail_file_name(root: &Path) -> String {
    format!("detail-{}.bin", root_key(root))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSpaceRecord {
    pub free_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSnapshot {
    pub generation: GenerationId,
    pub summary: DirectorySummary,
    pub detail: Option<DetailMap>,
}

/// On-disk form of one detail map entry. Paths are stored as raw bytes so
/// names that are not UTF-8 survive.
#[derive(Serialize)]
struct DetailEntryRef<'a> {
    #[serde(serialize_with = "crate::path_serde::serialize")]
    path: &'a Path,
    detail: FileDetail,
}

#[derive(Deserialize)]
struct DetailEntry {
    #[serde(with = "crate::path_serde")]
    path: PathBuf,
    detail: FileDetail,
}

fn encode_detail(detail: &DetailMap) -> Result<Vec<u8>> {
    let entries: Vec<DetailEntryRef<'_>> = detail
        .iter()
        .map(|(path, detail)| DetailEntryRef {
            path: path.as_path(),
            detail: *detail,
        })
        .collect();
    Ok(bincode_options().serialize(&entries)?)
}

fn decode_detail(bytes: &[u8]) -> Result<DetailMap> {
    let entries: Vec<DetailEntry> = bincode_options()
        .with_limit(DETAIL_PAYLOAD_LIMIT_BYTES)
        .deserialize(bytes)?;
    Ok(entries.into_iter().map(|e| (e.path, e.detail)).collect())
}

fn bincode_options() -> impl bincode::Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// Database handle. Open once per run; the index it builds stays valid for
/// the lifetime of the handle since this process is the only writer.
pub struct SnapshotStore {
    data_root: PathBuf,
    index: GenerationIndex,
}

impl SnapshotStore {
    /// Opens (creating if needed) the data root and indexes its generations.
    pub fn open(data_root: impl Into<PathBuf>) -> Result<Self> {
        let data_root = data_root.into();
        fs::create_dir_all(&data_root).map_err(|e| Error::io(&data_root, e))?;
        let index = GenerationIndex::build(&data_root)?;

        tracing::debug!(
            data_root = %data_root.display(),
            generations = index.len(),
            "snapshot store opened"
        );

        Ok(SnapshotStore { data_root, index })
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn index(&self) -> &GenerationIndex {
        &self.index
    }

    pub fn generation_dir(&self, id: GenerationId) -> PathBuf {
        self.data_root.join(id.dir_name())
    }

    /// Creates the directory for `id`. Saving into a generation that already
    /// exists (two runs in the same second) is allowed.
    pub fn begin_generation(&mut self, id: GenerationId) -> Result<()> {
        let dir = self.generation_dir(id);
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        self.index.insert_generation(id);
        Ok(())
    }

    /// Persists `summary` and, when given, its detail map under `id`.
    ///
    /// The summary is the primary record and its failure is returned. The
    /// detail map is a side artifact: a failure to write it is logged and the
    /// saved summary stands.
    pub fn save(
        &mut self,
        id: GenerationId,
        summary: &DirectorySummary,
        detail: Option<&DetailMap>,
    ) -> Result<()> {
        self.begin_generation(id)?;
        let dir = self.generation_dir(id);

        let summary_name = summary_file_name(&summary.path);
        let text = toml::to_string(summary)?;
        write_atomic(&dir.join(&summary_name), text.as_bytes())?;
        self.index.record_artifact(id, &summary_name);

        if let Some(detail) = detail {
            let detail_name = detail_file_name(&summary.path);
            let written = encode_detail(detail).and_then(|bytes| write_atomic(&dir.join(&detail_name), &bytes));

            match written {
                Ok(()) => self.index.record_artifact(id, &detail_name),
                Err(e) => tracing::error!(
                    root = %summary.path.display(),
                    "failed to save detail map: {e}"
                ),
            }
        }

        Ok(())
    }

    /// Loads the snapshot of `root` that is `steps_back` generations before
    /// the newest one holding it.
    pub fn load_previous(&self, root: &Path, steps_back: usize, with_detail: bool) -> Result<SavedSnapshot> {
        let ids = self.index.holding(&summary_file_name(root));
        if ids.is_empty() {
            return Err(Error::NoSnapshots {
                root: root.to_path_buf(),
            });
        }

        let generation = GenerationIndex::select(&ids, steps_back).ok_or(Error::StepsOutOfRange {
            steps_back,
            available: ids.len(),
        })?;

        let summary = self.load_summary(generation, root)?;
        let detail = if with_detail {
            self.load_detail(generation, root)
        } else {
            None
        };

        Ok(SavedSnapshot {
            generation,
            summary,
            detail,
        })
    }

    pub fn load_summary(&self, id: GenerationId, root: &Path) -> Result<DirectorySummary> {
        let path = self.generation_dir(id).join(summary_file_name(root));
        read_toml(&path)
    }

    /// Detail maps are best effort: absent or unreadable maps come back as
    /// `None` and a log line.
    pub fn load_detail(&self, id: GenerationId, root: &Path) -> Option<DetailMap> {
        let name = detail_file_name(root);
        if !self.index.get(id).is_some_and(|g| g.contains(&name)) {
            tracing::debug!(root = %root.display(), generation = %id, "no detail map saved");
            return None;
        }

        let path = self.generation_dir(id).join(name);
        let decoded = fs::read(&path)
            .map_err(|e| Error::io(&path, e))
            .and_then(|bytes| decode_detail(&bytes));

        match decoded {
            Ok(detail) => Some(detail),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to load detail map: {e}");
                None
            }
        }
    }

    pub fn save_free_space(&mut self, id: GenerationId, free_bytes: u64) -> Result<()> {
        self.begin_generation(id)?;
        let text = toml::to_string(&FreeSpaceRecord { free_bytes })?;
        write_atomic(&self.generation_dir(id).join(FREE_SPACE_FILE), text.as_bytes())?;
        self.index.record_artifact(id, FREE_SPACE_FILE);
        Ok(())
    }

    pub fn load_previous_free_space(&self, steps_back: usize) -> Result<(u64, GenerationId)> {
        let ids = self.index.holding(FREE_SPACE_FILE);
        if ids.is_empty() {
            return Err(Error::NoFreeSpaceRecords);
        }

        let generation = GenerationIndex::select(&ids, steps_back).ok_or(Error::StepsOutOfRange {
            steps_back,
            available: ids.len(),
        })?;

        let record: FreeSpaceRecord = read_toml(&self.generation_dir(generation).join(FREE_SPACE_FILE))?;
        Ok((record.free_bytes, generation))
    }

    /// Free space recorded in one specific generation, if any.
    pub fn free_space_at(&self, id: GenerationId) -> Result<Option<u64>> {
        if !self.index.get(id).is_some_and(|g| g.contains(FREE_SPACE_FILE)) {
            return Ok(None);
        }
        let record: FreeSpaceRecord = read_toml(&self.generation_dir(id).join(FREE_SPACE_FILE))?;
        Ok(Some(record.free_bytes))
    }

    pub(crate) fn delete_generation(&mut self, id: GenerationId) -> std::io::Result<()> {
        fs::remove_dir_all(self.generation_dir(id))?;
        self.index.remove(id);
        Ok(())
    }
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    toml::from_str(&text).map_err(|source| Error::TomlDecode {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes through a sibling `.tmp` file so a crash never leaves a torn
/// artifact under its real name.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, bytes).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::io(path, e)
    })
}
