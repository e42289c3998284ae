use std::path::{Component, Path, PathBuf};

use crate::consts::{CACHE_ENV, DEFAULT_CACHE_DIR};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Expand a leading `~` to the home directory.
///
/// Paths without a leading `~`, or with no resolvable home, are returned as-is.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let Ok(rest) = path.strip_prefix("~") else {
    return path.to_path_buf();
  };
  match home_dir() {
    Some(home) => home.join(rest),
    None => path.to_path_buf(),
  }
}

/// Lexically normalize a path: drop `.` components and fold `..` into
/// their parent. The filesystem is never consulted.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Make `path` absolute, resolving relative paths against `base`.
///
/// A leading `~` is expanded first, so `~/EULA.txt` names a file in the
/// home directory rather than under `base`. A relative `base` is itself
/// resolved against the current directory.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
  let path = expand_tilde(path);
  if path.is_absolute() {
    return normalize(&path);
  }
  let base = if base.is_absolute() {
    base.to_path_buf()
  } else {
    std::env::current_dir().map(|cwd| cwd.join(base)).unwrap_or_else(|_| base.to_path_buf())
  };
  normalize(&base.join(path))
}

/// The download cache used when `--cache-dir` is not given.
///
/// `CONDA_BUNDLE_CACHE` overrides the built-in `~/.conda/conda_bundle`.
pub fn default_cache_dir() -> PathBuf {
  let raw = std::env::var_os(CACHE_ENV)
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
  absolutize(Path::new("."), &raw)
}
