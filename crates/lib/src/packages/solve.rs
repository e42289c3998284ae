//! Solving specs through the conda executable.
//!
//! The solve is a `create --dry-run --json` against a throwaway prefix. conda
//! reports the packages it would link (in install order) and, among those,
//! the ones it would have to fetch. Packages already in the package cache
//! only show up under `LINK`.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use super::PackageError;
use super::dist::{Dist, EXTENSIONS};
use crate::process::Tool;

#[derive(Debug, Deserialize)]
struct SolverOutput {
  #[serde(default)]
  success: Option<bool>,
  #[serde(default)]
  actions: Option<Actions>,
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct Actions {
  #[serde(default)]
  fetch: Vec<FetchRecord>,
  #[serde(default)]
  link: Vec<LinkRecord>,
}

#[derive(Debug, Deserialize)]
struct FetchRecord {
  url: String,
  #[serde(default, rename = "fn")]
  filename: Option<String>,
  #[serde(default)]
  md5: Option<String>,
  #[serde(default)]
  sha256: Option<String>,
  #[serde(default)]
  size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LinkRecord {
  dist_name: String,
  #[serde(default)]
  base_url: Option<String>,
  #[serde(default)]
  platform: Option<String>,
}

/// The record conda keeps next to every extracted package.
#[derive(Debug, Deserialize)]
struct RepodataRecord {
  url: String,
  #[serde(default)]
  md5: Option<String>,
  #[serde(default)]
  sha256: Option<String>,
  #[serde(default)]
  size: Option<u64>,
}

impl FetchRecord {
  fn dist_name(&self) -> Option<&str> {
    let filename = match &self.filename {
      Some(name) => name.as_str(),
      None => self.url.rsplit('/').next()?,
    };
    super::dist::strip_extension(filename)
  }
}

/// Arguments for a dry-run solve into `prefix`.
pub fn solver_args(prefix: &Path, channels: &[String], specs: &[String]) -> Vec<String> {
  let mut args: Vec<String> = [
    "create",
    "--dry-run",
    "--json",
    "--yes",
    "--override-channels",
    "--prefix",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect();
  args.push(prefix.display().to_string());
  for channel in channels {
    args.push("-c".to_string());
    args.push(channel.clone());
  }
  args.extend(specs.iter().cloned());
  args
}

/// Turn solver JSON into the ordered package list.
pub fn parse_solution(json: &str, download_dir: &Path) -> Result<Vec<Dist>, PackageError> {
  let output: SolverOutput = serde_json::from_str(json).map_err(|source| PackageError::SolverOutput { source })?;

  if output.success == Some(false) || output.error.is_some() {
    let message = output
      .message
      .or(output.error)
      .unwrap_or_else(|| "solver reported failure".to_string());
    return Err(PackageError::Solve { message });
  }

  let actions = output.actions.unwrap_or_default();
  let mut dists = Vec::with_capacity(actions.link.len());
  for link in &actions.link {
    let dist = match actions.fetch.iter().find(|f| f.dist_name() == Some(link.dist_name.as_str())) {
      Some(fetch) => {
        let mut dist = Dist::from_url(&fetch.url)?;
        dist.md5 = fetch.md5.clone();
        dist.sha256 = fetch.sha256.clone();
        dist.size = fetch.size;
        dist
      }
      None => cached_dist(link, download_dir)?,
    };
    dists.push(dist);
  }

  if dists.is_empty() {
    return Err(PackageError::NoPackages);
  }
  Ok(dists)
}

/// Rebuild a record for a package conda found in the package cache.
fn cached_dist(link: &LinkRecord, download_dir: &Path) -> Result<Dist, PackageError> {
  let record_path = download_dir.join(&link.dist_name).join("info").join("repodata_record.json");
  let record = std::fs::read_to_string(&record_path)
    .ok()
    .and_then(|content| serde_json::from_str::<RepodataRecord>(&content).ok());
  if let Some(record) = record {
    debug!(path = ?record_path, "using cached repodata record");
    let mut dist = Dist::from_url(&record.url)?;
    dist.md5 = record.md5;
    dist.sha256 = record.sha256;
    dist.size = record.size;
    return Ok(dist);
  }

  let filename = EXTENSIONS
    .iter()
    .map(|ext| format!("{}{ext}", link.dist_name))
    .find(|name| download_dir.join(name).is_file())
    .ok_or_else(|| PackageError::MissingFromCache {
      dist: link.dist_name.clone(),
      dir: download_dir.to_path_buf(),
    })?;

  let (Some(base_url), Some(platform)) = (&link.base_url, &link.platform) else {
    return Err(PackageError::MissingFromCache {
      dist: link.dist_name.clone(),
      dir: download_dir.to_path_buf(),
    });
  };
  Dist::from_url(&format!("{}/{platform}/{filename}", base_url.trim_end_matches('/')))
}

/// Run the solver for `subdir` and return the packages to install.
pub async fn solve(
  conda_exe: &Path,
  subdir: &str,
  channels: &[String],
  specs: &[String],
  download_dir: &Path,
) -> Result<Vec<Dist>, PackageError> {
  let scratch = tempfile::tempdir().map_err(|source| PackageError::Io {
    path: std::env::temp_dir(),
    source,
  })?;
  let prefix = scratch.path().join("env");

  info!(subdir = %subdir, specs = specs.len(), "solving package specs");
  let tool = Tool::new(conda_exe)
    .args(solver_args(&prefix, channels, specs))
    .env("CONDA_SUBDIR", subdir)
    .env("CONDA_PKGS_DIRS", download_dir.as_os_str());

  let output = tool.output().await?;
  match parse_solution(&output.stdout, download_dir) {
    Err(PackageError::SolverOutput { .. }) if output.code != Some(0) => Err(PackageError::Solve {
      message: if output.stderr.trim().is_empty() {
        format!("'{}' exited with code {:?}", tool.command_line(), output.code)
      } else {
        output.stderr.trim().to_string()
      },
    }),
    Ok(_) if output.code != Some(0) => Err(PackageError::Solve {
      message: format!("'{}' exited with code {:?}", tool.command_line(), output.code),
    }),
    result => result,
  }
}
