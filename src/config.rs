use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::platform;

const APP_NAME: &str = "spacemon";
const DEFAULT_MAX_SNAPSHOTS: usize = 20;
const DEFAULT_DAEMON_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectorySettings {
    pub path: PathBuf,
}

/// On-disk shape of `config.toml`. Every field is optional so a partial file
/// only overrides what it mentions.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    dirs: Vec<DirectorySettings>,
    max_snapshots: Option<usize>,
    detailed_mode: Option<bool>,
    count_root_dir: Option<bool>,
    data_dir: Option<PathBuf>,
    log_file: Option<PathBuf>,
    report_file: Option<PathBuf>,
    daemon_interval: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub dirs: Vec<DirectorySettings>,
    pub max_snapshots: usize,
    pub detailed_mode: bool,
    /// Whether the scanned root counts towards its own `dirs` total.
    pub count_root_dir: bool,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub report_file: Option<PathBuf>,
    pub daemon_interval: Duration,
}

impl Config {
    /// Default location of the config file (`~/.config/spacemon/config.toml` on Linux).
    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        let file = match std::fs::read_to_string(&path) {
            Ok(text) => parse(&path, &text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                ConfigFile::default()
            }
            Err(e) => return Err(Error::io(&path, e)),
        };

        Self::from_file(&path, file)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let origin = Path::new("<inline>");
        Self::from_file(origin, parse(origin, text)?)
    }

    fn from_file(origin: &Path, file: ConfigFile) -> Result<Self> {
        let dirs = project_dirs()?;
        let home = platform::home_dir();
        let expand = |p: PathBuf| platform::expand_tilde(&p, home.as_deref());

        let daemon_interval = match file.daemon_interval {
            Some(raw) => humantime::parse_duration(&raw).map_err(|e| Error::Config {
                path: origin.to_path_buf(),
                message: format!("daemon_interval '{raw}': {e}"),
            })?,
            None => DEFAULT_DAEMON_INTERVAL,
        };

        Ok(Config {
            dirs: file.dirs,
            max_snapshots: file.max_snapshots.unwrap_or(DEFAULT_MAX_SNAPSHOTS),
            detailed_mode: file.detailed_mode.unwrap_or(false),
            count_root_dir: file.count_root_dir.unwrap_or(false),
            data_dir: file
                .data_dir
                .map(expand)
                .unwrap_or_else(|| dirs.data_dir().join("data")),
            log_file: file
                .log_file
                .map(expand)
                .unwrap_or_else(|| dirs.data_local_dir().join("spacemon.log")),
            report_file: file.report_file.map(expand),
            daemon_interval,
        })
    }

    /// Absolute, canonical form of every configured root, in config order.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.dirs.iter().map(|d| platform::resolve_root(&d.path)).collect()
    }
}

fn parse(path: &Path, text: &str) -> Result<ConfigFile> {
    toml::from_str(text).map_err(|e| Error::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME).ok_or(Error::MissingDirectory("home"))
}
