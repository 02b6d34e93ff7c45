use std::path::PathBuf;

use thiserror::Error;

use crate::store::generation::GenerationId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan root {path} is not readable: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no saved snapshots for {root}")]
    NoSnapshots { root: PathBuf },

    #[error("no saved free space records")]
    NoFreeSpaceRecords,

    #[error("steps back {steps_back} is out of range, only {available} snapshot(s) saved")]
    StepsOutOfRange { steps_back: usize, available: usize },

    #[error("failed to delete generation {generation}: {source}")]
    Prune {
        generation: GenerationId,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("could not determine {0} directory")]
    MissingDirectory(&'static str),

    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("toml decode error in {path}: {source}")]
    TomlDecode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the "nothing to compare against" family. Callers treat these
    /// as an empty baseline rather than a failure.
    pub fn is_missing_baseline(&self) -> bool {
        matches!(
            self,
            Error::NoSnapshots { .. } | Error::NoFreeSpaceRecords | Error::StepsOutOfRange { .. }
        )
    }
}
