//! Implementation of `conda-bundle --clean`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use condabundle_lib::clean::clean_cache;

use crate::output::{Mark, human_bytes, print_rows, status};

pub fn cmd_clean(cache_dir: Option<PathBuf>) -> Result<()> {
  let cache_dir = super::resolve_cache_dir(cache_dir);
  status(Mark::Note, &format!("cleaning cache: '{}'", cache_dir.display()));

  let stats = clean_cache(&cache_dir).context("Failed to clean cache")?;
  if !stats.existed {
    status(Mark::Note, "Cache directory does not exist, nothing to do");
    return Ok(());
  }

  status(Mark::Done, "Cache cleaned");
  print_rows(&[
    ("files removed", stats.files_deleted.to_string()),
    ("space freed", human_bytes(stats.bytes_freed)),
  ]);
  Ok(())
}
