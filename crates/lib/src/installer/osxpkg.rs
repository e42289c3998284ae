//! macOS `.pkg` installers, built with `pkgbuild` and `productbuild`.
//!
//! The component package installs the conda executable, the package files
//! and metadata into the install location; its postinstall script then runs
//! the offline install in place.

use std::path::{Path, PathBuf};

use tracing::info;

use super::{InstallerError, copy_file, make_executable, write_file};
use crate::consts::BUNDLED_CONDA_EXE;
use crate::info::BuildInfo;
use crate::packages::preconda;
use crate::platform::arch::Arch;
use crate::process::{Tool, find_tool};
use crate::template::condarc::{Flavor, condarc_lines};
use crate::template::embedded::{OSX_DISTRIBUTION, OSX_POSTINSTALL, OSX_PREINSTALL};
use crate::template::{Values, fill_template, preprocess, read_ascii_only, render, values};

const IDENTIFIER_PREFIX: &str = "io.condabundle";

fn identifier(info: &BuildInfo) -> String {
  format!("{IDENTIFIER_PREFIX}.{}", info.prefix_name())
}

/// Where the package installs to.
pub fn install_location(info: &BuildInfo) -> String {
  info
    .recipe
    .default_prefix
    .clone()
    .unwrap_or_else(|| format!("/opt/{}", info.prefix_name()))
}

fn host_arch(info: &BuildInfo) -> &'static str {
  match info.platform.arch {
    Arch::Arm64 | Arch::Aarch64 => "arm64",
    _ => "x86_64",
  }
}

/// Render the preinstall and postinstall scripts.
pub fn scripts(info: &BuildInfo) -> Result<(String, String), InstallerError> {
  let ns = info.template_namespace();
  let channels = info.final_channels();
  let dunder: Values = values([
    ("NAME", info.recipe.name.clone()),
    ("VERSION", info.recipe.version.clone()),
    ("CONDA_EXE", BUNDLED_CONDA_EXE.to_string()),
    ("CHANNELS", channels.join(",")),
  ]);
  let condarc = condarc_lines(
    Flavor::Shell,
    info.recipe.write_condarc,
    &info.recipe.conda_default_channels,
    &channels,
  );
  let at = values([("WRITE_CONDARC", condarc.join("\n"))]);

  let pre = render(&preprocess(OSX_PREINSTALL, &ns)?, &dunder, &Values::new())?;
  let post = render(&preprocess(OSX_POSTINSTALL, &ns)?, &dunder, &at)?;
  Ok((pre, post))
}

/// Render the productbuild distribution file.
pub fn distribution(info: &BuildInfo) -> Result<String, InstallerError> {
  let welcome = format!(
    "This installer will install {} {} into {}.",
    info.recipe.name,
    info.recipe.version,
    install_location(info)
  );
  let dunder = values([
    ("NAME", info.recipe.name.clone()),
    ("VERSION", info.recipe.version.clone()),
    ("WELCOME_TEXT", welcome),
    ("HOST_ARCH", host_arch(info).to_string()),
    ("IDENTIFIER", identifier(info)),
  ]);
  let data = preprocess(OSX_DISTRIBUTION, &info.template_namespace())?;
  Ok(fill_template(&data, &dunder)?)
}

/// Lay out the package root, scripts and resources under `staging`.
fn stage(info: &BuildInfo, staging: &Path) -> Result<(PathBuf, PathBuf, PathBuf), InstallerError> {
  let root = staging.join("root");
  let scripts_dir = staging.join("scripts");
  let resources = staging.join("resources");

  copy_file(&info.conda_exe, &root.join(BUNDLED_CONDA_EXE))?;
  for dist in &info.dists {
    copy_file(&info.download_dir.join(&dist.filename), &root.join("pkgs").join(&dist.filename))?;
  }
  let files = preconda::write_files(
    &staging.join("preconda"),
    &info.dists,
    &info.recipe.channels_remap,
    info.recipe.specs(),
    &info.history_command(),
  )?;
  for (path, name) in files.with_prefix_paths() {
    copy_file(path, &root.join(name))?;
  }
  if let Some(post) = &info.recipe.post_install {
    copy_file(post, &root.join("pkgs").join("post_install.sh"))?;
  }

  let (pre, post) = scripts(info)?;
  for (name, content) in [("preinstall", pre), ("postinstall", post)] {
    let path = scripts_dir.join(name);
    write_file(&path, &content)?;
    make_executable(&path)?;
  }
  if let Some(pre_install) = &info.recipe.pre_install {
    let path = scripts_dir.join("user_preinstall.sh");
    copy_file(pre_install, &path)?;
    make_executable(&path)?;
  }

  if let Some(license) = &info.recipe.license_file {
    write_file(&resources.join("license.txt"), &read_ascii_only(license)?)?;
  } else {
    write_file(&resources.join(".keep"), "")?;
  }

  write_file(&staging.join("distribution.xml"), &distribution(info)?)?;
  Ok((root, scripts_dir, resources))
}

pub async fn create(info: &BuildInfo) -> Result<(), InstallerError> {
  let pkgbuild = find_tool("pkgbuild", None, "pkgbuild ships with the Xcode command line tools")?;
  let productbuild = find_tool("productbuild", None, "productbuild ships with the Xcode command line tools")?;

  let staging = super::scratch_dir()?;
  let (root, scripts_dir, resources) = stage(info, staging.path())?;
  let packages = staging.path().join("packages");
  std::fs::create_dir_all(&packages).map_err(super::io_error(&packages))?;

  Tool::new(pkgbuild)
    .arg("--root")
    .arg(&root)
    .arg("--identifier")
    .arg(identifier(info))
    .arg("--version")
    .arg(&info.recipe.version)
    .arg("--scripts")
    .arg(&scripts_dir)
    .arg("--install-location")
    .arg(install_location(info))
    .arg(packages.join("core.pkg"))
    .run()
    .await?;

  Tool::new(productbuild)
    .arg("--distribution")
    .arg(staging.path().join("distribution.xml"))
    .arg("--resources")
    .arg(&resources)
    .arg("--package-path")
    .arg(&packages)
    .arg(&info.outpath)
    .run()
    .await?;

  info!(path = ?info.outpath, "macOS package written");
  Ok(())
}
