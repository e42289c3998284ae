//! Packed conda environments (`.tar.bz2`).
//!
//! The solved package set is installed offline into a temporary environment
//! next to the output file, which `conda-pack` then archives.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{InstallerError, io_error, write_file};
use crate::info::BuildInfo;
use crate::packages::preconda::explicit_list;
use crate::process::{Tool, find_tool};

/// Directory holding temporary environments for `outpath`.
fn tmp_base(outpath: &Path) -> PathBuf {
  outpath.parent().map(Path::to_path_buf).unwrap_or_default().join("tmp")
}

fn cpu_count() -> usize {
  std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Arguments to install the explicit package list into `prefix`.
pub fn install_args(prefix: &Path, env_file: &Path) -> Vec<String> {
  vec![
    "create".to_string(),
    "--offline".to_string(),
    "--yes".to_string(),
    "--prefix".to_string(),
    prefix.display().to_string(),
    "--file".to_string(),
    env_file.display().to_string(),
  ]
}

/// Arguments for `conda-pack`.
pub fn pack_args(prefix: &Path, outpath: &Path, threads: usize) -> Vec<String> {
  vec![
    "--prefix".to_string(),
    prefix.display().to_string(),
    "--output".to_string(),
    outpath.display().to_string(),
    "--format".to_string(),
    "tar.bz2".to_string(),
    "--compress-level".to_string(),
    "1".to_string(),
    "--n-threads".to_string(),
    threads.to_string(),
    "--force".to_string(),
  ]
}

pub async fn create(info: &BuildInfo) -> Result<(), InstallerError> {
  let conda_pack = find_tool("conda-pack", None, "install it with `conda install conda-pack`")?;

  let base = tmp_base(&info.outpath);
  std::fs::create_dir_all(&base).map_err(io_error(&base))?;
  let scratch = tempfile::Builder::new()
    .prefix("env-")
    .tempdir_in(&base)
    .map_err(io_error(&base))?;
  let prefix = scratch.path().join("env");

  // Original URLs, so conda finds the packages in the download cache.
  let env_file = scratch.path().join("env.txt");
  write_file(&env_file, &explicit_list(&info.dists, &[]))?;

  Tool::new(&info.conda_exe)
    .args(install_args(&prefix, &env_file))
    .env("CONDA_SUBDIR", info.platform.subdir())
    .env("CONDA_PKGS_DIRS", info.download_dir.as_os_str())
    .run()
    .await?;
  info!(prefix = ?prefix, "temporary environment created");

  let threads = cpu_count();
  info!(threads, "packing environment");
  Tool::new(conda_pack)
    .args(pack_args(&prefix, &info.outpath, threads))
    .run()
    .await?;

  drop(scratch);
  if std::fs::remove_dir(&base).is_err() {
    debug!(path = ?base, "temporary base directory not empty, leaving it");
  }

  info!(path = ?info.outpath, "environment archive written");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tmp_base_is_next_to_output() {
    assert_eq!(tmp_base(Path::new("/out/demo.tar.bz2")), PathBuf::from("/out/tmp"));
  }

  #[test]
  fn install_is_offline_from_explicit_file() {
    let args = install_args(Path::new("/out/tmp/env-1/env"), Path::new("/out/tmp/env-1/env.txt"));
    assert_eq!(args[0], "create");
    assert!(args.contains(&"--offline".to_string()));
    assert_eq!(args.last().unwrap(), "/out/tmp/env-1/env.txt");
  }

  #[test]
  fn pack_uses_fast_compression() {
    let args = pack_args(Path::new("/env"), Path::new("/out/demo.tar.bz2"), 8);
    let level = args.iter().position(|a| a == "--compress-level").unwrap();
    assert_eq!(args[level + 1], "1");
    let threads = args.iter().position(|a| a == "--n-threads").unwrap();
    assert_eq!(args[threads + 1], "8");
    assert!(args.contains(&"tar.bz2".to_string()));
  }
}
