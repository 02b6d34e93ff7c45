use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .or_else(|| {
            std::env::var_os("HOME")
                .or_else(|| std::env::var_os("USERPROFILE"))
                .map(PathBuf::from)
        })
}

/// Expands a leading `~` or `~/` against `home`. Anything else is returned as is.
pub fn expand_tilde(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };

    if path == Path::new("~") {
        return home.to_path_buf();
    }

    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Turns a configured root into the absolute path snapshots are keyed by.
///
/// Canonicalization resolves symlinks and `..`, but a root that no longer
/// exists still has to map to the same key so saved history can be replayed,
/// so we fall back to the expanded absolute path.
pub fn resolve_root(raw: &Path) -> PathBuf {
    let expanded = expand_tilde(raw, home_dir().as_deref());

    if let Ok(canonical) = std::fs::canonicalize(&expanded) {
        return canonical;
    }

    if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    }
}

/// Bytes available to unprivileged users on the volume holding `path`.
pub fn free_space(path: &Path) -> Result<u64> {
    fs2::available_space(path).map_err(|e| Error::io(path, e))
}

/// Raw bytes of a path. Lossless on unix, where file names are arbitrary
/// bytes; elsewhere paths go through UTF-8 (lossily for unpaired surrogates).
#[cfg(unix)]
pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

/// Inverse of [`path_bytes`].
#[cfg(unix)]
pub fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
pub fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}
