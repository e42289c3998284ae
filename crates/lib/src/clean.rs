//! Removing the package download cache.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CleanError {
  #[error("failed to scan {}: {source}", path.display())]
  Scan { path: PathBuf, source: walkdir::Error },

  #[error("failed to delete {}: {source}", path.display())]
  Delete { path: PathBuf, source: std::io::Error },
}

#[derive(Debug, Default, serde::Serialize)]
pub struct CleanStats {
  pub cache_dir: PathBuf,
  pub existed: bool,
  pub files_deleted: usize,
  pub bytes_freed: u64,
}

/// Delete `cache_dir` and everything in it. A missing directory is not an
/// error.
pub fn clean_cache(cache_dir: &Path) -> Result<CleanStats, CleanError> {
  let mut stats = CleanStats {
    cache_dir: cache_dir.to_path_buf(),
    ..Default::default()
  };
  if !cache_dir.is_dir() {
    debug!(path = ?cache_dir, "cache directory does not exist");
    return Ok(stats);
  }
  stats.existed = true;

  for entry in WalkDir::new(cache_dir) {
    let entry = entry.map_err(|source| CleanError::Scan {
      path: cache_dir.to_path_buf(),
      source,
    })?;
    if entry.file_type().is_file() {
      stats.files_deleted += 1;
      stats.bytes_freed += entry.metadata().map(|m| m.len()).unwrap_or(0);
    }
  }

  fs::remove_dir_all(cache_dir).map_err(|source| CleanError::Delete {
    path: cache_dir.to_path_buf(),
    source,
  })?;
  info!(path = ?cache_dir, files = stats.files_deleted, bytes = stats.bytes_freed, "cache cleaned");
  Ok(stats)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn removes_cache_and_counts_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    fs::create_dir_all(cache.join("linux-64")).unwrap();
    fs::write(cache.join("linux-64").join("a.conda"), b"12345").unwrap();
    fs::write(cache.join("linux-64").join("b.tar.bz2"), b"123").unwrap();

    let stats = clean_cache(&cache).unwrap();
    assert!(stats.existed);
    assert_eq!(stats.files_deleted, 2);
    assert_eq!(stats.bytes_freed, 8);
    assert!(!cache.exists());
  }

  #[test]
  fn missing_cache_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    let stats = clean_cache(&dir.path().join("nope")).unwrap();
    assert!(!stats.existed);
    assert_eq!(stats.files_deleted, 0);
  }
}
