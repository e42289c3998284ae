//! Resolving, downloading and describing the bundled package set.
//!
//! The package set comes either from the recipe's explicit `packages` URLs
//! or from solving its `specs` with the conda executable. `exclude` then
//! removes packages by name.

pub mod channels;
mod dist;
mod download;
pub mod preconda;
mod solve;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

pub use dist::{Dist, split_filename};
pub use download::{fetch, fetch_all};
pub use solve::{parse_solution, solve, solver_args};

use crate::platform::Platform;
use crate::process::ToolError;
use crate::recipe::Recipe;
use crate::util::hash::HashError;

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("invalid package reference '{reference}': {reason}")]
  InvalidReference { reference: String, reason: String },

  #[error("solving failed: {message}")]
  Solve { message: String },

  #[error("could not parse solver output: {source}")]
  SolverOutput { source: serde_json::Error },

  #[error("solver returned no packages")]
  NoPackages,

  #[error("package {dist} is neither fetched nor in the package cache {}", dir.display())]
  MissingFromCache { dist: String, dir: PathBuf },

  #[error("cannot exclude '{name}': {reason}")]
  Exclude { name: String, reason: String },

  #[error("failed to download {url}: {message}")]
  Download { url: String, message: String },

  #[error("I/O error at {}: {source}", path.display())]
  Io { path: PathBuf, source: std::io::Error },

  #[error(transparent)]
  Checksum(#[from] HashError),

  #[error(transparent)]
  Tool(#[from] ToolError),
}

/// Remove excluded packages by name.
///
/// Each name must be a bare package name present in the set.
pub fn exclude(dists: Vec<Dist>, names: &[String]) -> Result<Vec<Dist>, PackageError> {
  for name in names {
    if let Some(bad) = name.chars().find(|c| matches!(c, ' ' | '=' | '<' | '>' | '*')) {
      return Err(PackageError::Exclude {
        name: name.clone(),
        reason: format!("unexpected '{bad}' in package name"),
      });
    }
    if !dists.iter().any(|d| &d.name == name) {
      return Err(PackageError::Exclude {
        name: name.clone(),
        reason: "no such package in the solved set".to_string(),
      });
    }
  }
  Ok(dists.into_iter().filter(|d| !names.contains(&d.name)).collect())
}

/// Determine the package set for a recipe.
pub async fn resolve(
  recipe: &Recipe,
  platform: &Platform,
  conda_exe: &Path,
  download_dir: &Path,
) -> Result<Vec<Dist>, PackageError> {
  let dists = if recipe.packages().is_empty() {
    solve(conda_exe, &platform.subdir(), &recipe.channels, recipe.specs(), download_dir).await?
  } else {
    info!(count = recipe.packages().len(), "using explicit package list");
    recipe
      .packages()
      .iter()
      .map(|reference| Dist::from_url(reference))
      .collect::<Result<Vec<_>, _>>()?
  };

  let dists = exclude(dists, &recipe.exclude)?;
  debug!(count = dists.len(), "resolved package set");
  Ok(dists)
}
