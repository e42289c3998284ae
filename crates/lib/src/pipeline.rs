//! The build pipeline: recipe to installer.
//!
//! Steps run in order and stop at the first error:
//! 1. load and validate the recipe for the target platform
//! 2. pick the installer type and check the host can build it
//! 3. resolve the package set (a dry run stops here)
//! 4. download the packages into the cache
//! 5. hand everything to the backend

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::info::BuildInfo;
use crate::installer::{Backend, InstallerError, output_filename, resolve_type};
use crate::packages::{self, PackageError};
use crate::platform::os::Os;
use crate::platform::paths::absolutize;
use crate::platform::{Platform, PlatformError};
use crate::recipe::{self, RecipeError};

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("no such directory: {}", .0.display())]
  RecipeDir(PathBuf),

  #[error("conda executable '{}' does not exist", .0.display())]
  CondaExe(PathBuf),

  #[error("failed to create {}: {source}", path.display())]
  Io { path: PathBuf, source: std::io::Error },

  #[error(transparent)]
  Recipe(#[from] RecipeError),

  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error(transparent)]
  Installer(#[from] InstallerError),

  #[error(transparent)]
  Package(#[from] PackageError),
}

/// Inputs of one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  pub recipe_dir: PathBuf,
  pub output_dir: PathBuf,
  pub cache_dir: PathBuf,
  pub platform: Platform,
  pub conda_exe: PathBuf,
  pub dry_run: bool,
  pub verbose: bool,
}

/// What a build produced.
#[derive(Debug)]
pub enum BuildOutcome {
  /// Packages were solved; nothing was downloaded or written.
  DryRun(Box<BuildInfo>),
  /// The installer was written to `info.outpath`.
  Created(Box<BuildInfo>),
}

fn cwd() -> Result<PathBuf, BuildError> {
  std::env::current_dir().map_err(|source| BuildError::Io {
    path: PathBuf::from("."),
    source,
  })
}

/// Load the recipe and settle everything that can fail before any tool runs.
pub fn prepare(options: &BuildOptions, host: Os) -> Result<(BuildInfo, Backend), BuildError> {
  if !options.recipe_dir.is_dir() {
    return Err(BuildError::RecipeDir(options.recipe_dir.clone()));
  }
  if !options.conda_exe.is_file() {
    return Err(BuildError::CondaExe(options.conda_exe.clone()));
  }

  let cwd = cwd()?;
  let recipe_dir = absolutize(&cwd, &options.recipe_dir);
  let recipe = recipe::load(&recipe_dir, &options.platform)?;
  let itype = resolve_type(&options.platform, recipe.installer_type.as_deref())?;
  let backend = Backend::for_type(itype, host)?;

  let download_dir = absolutize(&cwd, &options.cache_dir).join(options.platform.subdir());
  let conda_exe = absolutize(&cwd, &options.conda_exe);
  let mut info = BuildInfo::new(recipe, options.platform, itype, recipe_dir, download_dir, conda_exe);
  info.verbose = options.verbose;
  Ok((info, backend))
}

/// Run a full build.
pub async fn build(options: &BuildOptions) -> Result<BuildOutcome, BuildError> {
  let host = Os::current().ok_or(PlatformError::Undetected)?;
  let (mut info, backend) = prepare(options, host)?;
  info!(
    platform = %info.platform,
    installer_type = %info.installer_type,
    download_dir = ?info.download_dir,
    "starting build"
  );

  info.dists = packages::resolve(&info.recipe, &info.platform, &info.conda_exe, &info.download_dir).await?;
  if options.dry_run {
    return Ok(BuildOutcome::DryRun(Box::new(info)));
  }

  info.approx_pkgs_size = packages::fetch_all(&info.dists, &info.download_dir).await?;

  let output_dir = absolutize(&cwd()?, &options.output_dir);
  std::fs::create_dir_all(&output_dir).map_err(|source| BuildError::Io {
    path: output_dir.clone(),
    source,
  })?;
  info.outpath = output_dir.join(output_filename(&info.recipe, &info.platform, info.installer_type));

  if let Ok(json) = serde_json::to_string_pretty(&info) {
    debug!(info = %json, "build info");
  }

  backend.create(&info).await?;
  Ok(BuildOutcome::Created(Box::new(info)))
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::*;

  fn options(dir: &Path, platform: &str) -> BuildOptions {
    BuildOptions {
      recipe_dir: dir.join("recipe"),
      output_dir: dir.join("out"),
      cache_dir: dir.join("cache"),
      platform: platform.parse().unwrap(),
      conda_exe: dir.join("conda.exe"),
      dry_run: true,
      verbose: false,
    }
  }

  fn write_recipe(dir: &Path, extra: &str) {
    let recipe_dir = dir.join("recipe");
    std::fs::create_dir_all(&recipe_dir).unwrap();
    std::fs::write(
      recipe_dir.join("construct.yaml"),
      format!("name: Demo\nversion: 1.0\nchannels:\n  - conda-forge\nspecs:\n  - python\n{extra}"),
    )
    .unwrap();
  }

  #[test]
  fn missing_conda_exe_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_recipe(dir.path(), "");
    let err = prepare(&options(dir.path(), "linux-64"), Os::Linux).unwrap_err();
    assert!(matches!(err, BuildError::CondaExe(_)));
  }

  #[test]
  fn missing_recipe_dir_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = prepare(&options(dir.path(), "linux-64"), Os::Linux).unwrap_err();
    assert!(matches!(err, BuildError::RecipeDir(_)));
  }

  #[test]
  fn invalid_type_for_target_fails_in_prepare() {
    let dir = tempfile::tempdir().unwrap();
    write_recipe(dir.path(), "installer_type: pkg\n");
    std::fs::write(dir.path().join("conda.exe"), b"").unwrap();
    let err = prepare(&options(dir.path(), "linux-64"), Os::Linux).unwrap_err();
    assert!(matches!(err, BuildError::Installer(InstallerError::UnsupportedTarget { .. })));
  }

  #[test]
  fn host_mismatch_fails_in_prepare() {
    let dir = tempfile::tempdir().unwrap();
    write_recipe(dir.path(), "");
    std::fs::write(dir.path().join("conda.exe"), b"").unwrap();
    let err = prepare(&options(dir.path(), "osx-64"), Os::Linux).unwrap_err();
    assert!(matches!(err, BuildError::Installer(InstallerError::UnsupportedHost { .. })));
  }

  #[test]
  fn prepare_derives_download_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_recipe(dir.path(), "");
    std::fs::write(dir.path().join("conda.exe"), b"").unwrap();
    let (info, backend) = prepare(&options(dir.path(), "linux-64"), Os::Linux).unwrap();
    assert_eq!(backend, Backend::Shar);
    assert_eq!(info.download_dir, dir.path().join("cache").join("linux-64"));
    assert!(info.conda_exe.is_absolute());
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn dry_run_writes_nothing() {
    use crate::util::testutil::fake_tool;

    let dir = tempfile::tempdir().unwrap();
    write_recipe(dir.path(), "");
    let solution = r#"{"success": true, "actions": {"FETCH": [{"url": "https://conda.anaconda.org/conda-forge/linux-64/python-3.11.8-h0.conda", "md5": "abc"}], "LINK": [{"dist_name": "python-3.11.8-h0"}]}}"#;
    fake_tool(dir.path(), "conda.exe", solution, 0);

    let outcome = build(&options(dir.path(), "linux-64")).await.unwrap();
    let BuildOutcome::DryRun(info) = outcome else {
      panic!("expected a dry run");
    };
    assert_eq!(info.dists.len(), 1);
    assert!(!dir.path().join("out").exists());
    assert!(!dir.path().join("cache").join("linux-64").join("python-3.11.8-h0.conda").exists());
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn invalid_type_never_runs_the_conda_executable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    write_recipe(dir.path(), "installer_type: exe\n");
    let marker = dir.path().join("ran");
    let conda = dir.path().join("conda.exe");
    std::fs::write(&conda, format!("#!/bin/sh\ntouch '{}'\n", marker.display())).unwrap();
    std::fs::set_permissions(&conda, std::fs::Permissions::from_mode(0o755)).unwrap();

    assert!(build(&options(dir.path(), "linux-64")).await.is_err());
    assert!(!marker.exists());
  }
}
