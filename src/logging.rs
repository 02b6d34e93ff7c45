use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Log files past this size are rotated at startup.
pub const MAX_LOG_BYTES: u64 = 1024 * 1024;

const FILTER_ENV: &str = "SPACEMON_LOG";

/// Installs the global subscriber: stderr plus an append-only log file.
///
/// Failing to open the log file is an error; callers treat it as fatal.
pub fn init(log_file: &Path, verbose: bool) -> Result<()> {
    let file = open_log_file(log_file)?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let writer = std::io::stderr.and(SharedFile(Arc::new(Mutex::new(file))));

    // a second init (daemon re-entry, tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    Ok(())
}

/// Opens `path` for appending, rotating it first if it grew too large.
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    rotate_if_needed(path, MAX_LOG_BYTES)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))
}

/// Moves `path` to `path.1` once it exceeds `limit`, replacing any older
/// backup. One backup is kept.
pub fn rotate_if_needed(path: &Path, limit: u64) -> Result<bool> {
    let len = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(path, e)),
    };

    if len <= limit {
        return Ok(false);
    }

    let backup = backup_path(path);
    std::fs::rename(path, &backup).map_err(|e| Error::io(&backup, e))?;
    Ok(true)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".1");
    path.with_file_name(name)
}

struct SharedFile(Arc<Mutex<File>>);

struct SharedFileGuard<'a>(MutexGuard<'a, File>);

impl<'a> MakeWriter<'a> for SharedFile {
    type Writer = SharedFileGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        // a panic mid-write leaves the file usable, keep logging
        SharedFileGuard(self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl std::io::Write for SharedFileGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}
