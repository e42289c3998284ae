//! Installer types and the backends that build them.
//!
//! Each installer type has one backend. Whether a type may be built depends
//! on both the target platform (what the installer runs on) and the host
//! (what the packaging tools run on); both are checked before any package is
//! solved or any external tool is run.

pub(crate) mod osxpkg;
pub(crate) mod shar;
mod tarbz2;
pub mod winexe;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::info::BuildInfo;
use crate::packages::PackageError;
use crate::platform::Platform;
use crate::platform::os::Os;
use crate::process::ToolError;
use crate::recipe::Recipe;
use crate::template::TemplateError;
use crate::util::hash::HashError;

#[derive(Debug, Error)]
pub enum InstallerError {
  #[error("invalid installer type '{0}', allowed types are: sh, pkg, exe, tar.bz2")]
  UnknownType(String),

  #[error("cannot create '.{itype}' installer for {os}")]
  UnsupportedTarget { itype: InstallerType, os: Os },

  #[error("cannot create '.{itype}' installer on this host: {reason}")]
  UnsupportedHost { itype: InstallerType, reason: &'static str },

  #[error("cannot run pre install on Windows")]
  PreInstallUnsupported,

  #[error("the package set must contain python")]
  MissingPython,

  #[error("license {} contains the line '{terminator}', which ends the embedded license text", path.display())]
  LicenseTerminator { path: PathBuf, terminator: &'static str },

  #[error("{key} must be a {expected} file: {}", path.display())]
  ImageFormat {
    key: &'static str,
    path: PathBuf,
    expected: &'static str,
  },

  #[error("I/O error at {}: {source}", path.display())]
  Io { path: PathBuf, source: std::io::Error },

  #[error("failed to write payload archive: {0}")]
  Archive(std::io::Error),

  #[error(transparent)]
  Template(#[from] TemplateError),

  #[error(transparent)]
  Tool(#[from] ToolError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error(transparent)]
  Hash(#[from] HashError),
}

/// The artifact formats conda-bundle can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallerType {
  Sh,
  Pkg,
  Exe,
  TarBz2,
}

impl InstallerType {
  pub const ALL: [InstallerType; 4] = [Self::Sh, Self::Pkg, Self::Exe, Self::TarBz2];

  /// The type name, also used as the file extension.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Sh => "sh",
      Self::Pkg => "pkg",
      Self::Exe => "exe",
      Self::TarBz2 => "tar.bz2",
    }
  }

  /// Installer built for a target OS when the recipe names none.
  pub fn default_for(os: Os) -> Self {
    match os {
      Os::Linux => Self::Sh,
      Os::Osx => Self::Pkg,
      Os::Win => Self::Exe,
    }
  }

  /// Installer types that can run on a target OS.
  pub fn allowed_for(os: Os) -> &'static [InstallerType] {
    match os {
      Os::Linux => &[Self::Sh, Self::TarBz2],
      Os::Osx => &[Self::Sh, Self::Pkg, Self::TarBz2],
      Os::Win => &[Self::Exe],
    }
  }
}

impl fmt::Display for InstallerType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for InstallerType {
  type Err = InstallerError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|t| t.as_str() == s)
      .ok_or_else(|| InstallerError::UnknownType(s.to_string()))
  }
}

impl Serialize for InstallerType {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

/// Pick and validate the installer type for a target platform.
pub fn resolve_type(platform: &Platform, requested: Option<&str>) -> Result<InstallerType, InstallerError> {
  let itype = match requested {
    Some(name) => name.parse()?,
    None => InstallerType::default_for(platform.os),
  };

  if !InstallerType::allowed_for(platform.os).contains(&itype) {
    return Err(InstallerError::UnsupportedTarget { itype, os: platform.os });
  }
  Ok(itype)
}

/// File name of the installer: `installer_filename`, or one derived from
/// name, version and platform.
pub fn output_filename(recipe: &Recipe, platform: &Platform, itype: InstallerType) -> String {
  if let Some(name) = &recipe.installer_filename {
    return name.clone();
  }
  format!(
    "{}-{}-{}-{}.{}",
    recipe.name,
    recipe.version,
    platform.os.display_name(),
    platform.arch.display_name(),
    itype
  )
}

/// A packaging backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
  Shar,
  OsxPkg,
  WinExe,
  TarBz2,
}

impl Backend {
  /// Select the backend for an installer type, checking the host can run it.
  pub fn for_type(itype: InstallerType, host: Os) -> Result<Self, InstallerError> {
    let unsupported = |reason| Err(InstallerError::UnsupportedHost { itype, reason });
    match itype {
      InstallerType::Sh if host == Os::Win => unsupported("cannot be built on Windows"),
      InstallerType::TarBz2 if host == Os::Win => unsupported("cannot be built on Windows"),
      InstallerType::Pkg if host != Os::Osx => unsupported("can only be built on macOS"),
      InstallerType::Exe if host != Os::Win => unsupported("can only be built on Windows"),
      InstallerType::Sh => Ok(Self::Shar),
      InstallerType::Pkg => Ok(Self::OsxPkg),
      InstallerType::Exe => Ok(Self::WinExe),
      InstallerType::TarBz2 => Ok(Self::TarBz2),
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::Shar => "shar",
      Self::OsxPkg => "osxpkg",
      Self::WinExe => "winexe",
      Self::TarBz2 => "tarbz2",
    }
  }

  /// Build the installer at `info.outpath`.
  pub async fn create(&self, info: &BuildInfo) -> Result<(), InstallerError> {
    info!(backend = self.name(), output = ?info.outpath, "creating installer");
    match self {
      Self::Shar => shar::create(info),
      Self::OsxPkg => osxpkg::create(info).await,
      Self::WinExe => winexe::create(info).await,
      Self::TarBz2 => tarbz2::create(info).await,
    }
  }
}

pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> InstallerError + '_ {
  move |source| InstallerError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// Create a scratch directory, removed when dropped.
pub(crate) fn scratch_dir() -> Result<tempfile::TempDir, InstallerError> {
  tempfile::Builder::new()
    .prefix("conda-bundle-")
    .tempdir()
    .map_err(io_error(&std::env::temp_dir()))
}

pub(crate) fn copy_file(src: &Path, dst: &Path) -> Result<(), InstallerError> {
  if let Some(parent) = dst.parent() {
    fs::create_dir_all(parent).map_err(io_error(parent))?;
  }
  fs::copy(src, dst).map_err(io_error(src))?;
  Ok(())
}

pub(crate) fn write_file(path: &Path, content: &str) -> Result<(), InstallerError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(io_error(parent))?;
  }
  fs::write(path, content).map_err(io_error(path))
}

#[cfg(unix)]
pub(crate) fn make_executable(path: &Path) -> Result<(), InstallerError> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(io_error(path))
}

#[cfg(not(unix))]
pub(crate) fn make_executable(_path: &Path) -> Result<(), InstallerError> {
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn platform(s: &str) -> Platform {
    s.parse().unwrap()
  }

  #[test]
  fn defaults_per_os() {
    assert_eq!(resolve_type(&platform("linux-64"), None).unwrap(), InstallerType::Sh);
    assert_eq!(resolve_type(&platform("osx-arm64"), None).unwrap(), InstallerType::Pkg);
    assert_eq!(resolve_type(&platform("win-64"), None).unwrap(), InstallerType::Exe);
  }

  #[test]
  fn allowed_combinations() {
    assert_eq!(resolve_type(&platform("linux-64"), Some("tar.bz2")).unwrap(), InstallerType::TarBz2);
    assert_eq!(resolve_type(&platform("osx-64"), Some("sh")).unwrap(), InstallerType::Sh);
    assert_eq!(resolve_type(&platform("osx-64"), Some("tar.bz2")).unwrap(), InstallerType::TarBz2);
  }

  #[test]
  fn invalid_combinations_are_rejected() {
    for (plat, itype) in [("linux-64", "pkg"), ("linux-64", "exe"), ("osx-64", "exe"), ("win-64", "sh"), ("win-64", "tar.bz2")] {
      let err = resolve_type(&platform(plat), Some(itype)).unwrap_err();
      assert!(matches!(err, InstallerError::UnsupportedTarget { .. }), "{plat} {itype}");
    }
  }

  #[test]
  fn unknown_type_is_rejected() {
    let err = resolve_type(&platform("linux-64"), Some("zip")).unwrap_err();
    assert_eq!(err.to_string(), "invalid installer type 'zip', allowed types are: sh, pkg, exe, tar.bz2");
  }

  #[test]
  fn host_constraints() {
    assert_eq!(Backend::for_type(InstallerType::Sh, Os::Linux).unwrap(), Backend::Shar);
    assert_eq!(Backend::for_type(InstallerType::Pkg, Os::Osx).unwrap(), Backend::OsxPkg);
    assert_eq!(Backend::for_type(InstallerType::Exe, Os::Win).unwrap(), Backend::WinExe);
    assert!(Backend::for_type(InstallerType::Sh, Os::Win).is_err());
    assert!(Backend::for_type(InstallerType::TarBz2, Os::Win).is_err());
    assert!(Backend::for_type(InstallerType::Pkg, Os::Linux).is_err());
    assert!(Backend::for_type(InstallerType::Exe, Os::Osx).is_err());
  }

  #[test]
  fn output_filename_rules() {
    let recipe = Recipe {
      name: "Miniforge".to_string(),
      version: "24.1".to_string(),
      ..Default::default()
    };
    assert_eq!(
      output_filename(&recipe, &platform("linux-64"), InstallerType::Sh),
      "Miniforge-24.1-Linux-x86_64.sh"
    );
    assert_eq!(
      output_filename(&recipe, &platform("win-32"), InstallerType::Exe),
      "Miniforge-24.1-Windows-x86.exe"
    );
    assert_eq!(
      output_filename(&recipe, &platform("osx-arm64"), InstallerType::Pkg),
      "Miniforge-24.1-MacOSX-arm64.pkg"
    );
    assert_eq!(
      output_filename(&recipe, &platform("linux-aarch64"), InstallerType::TarBz2),
      "Miniforge-24.1-Linux-aarch64.tar.bz2"
    );

    let named = Recipe {
      installer_filename: Some("custom.sh".to_string()),
      ..recipe
    };
    assert_eq!(output_filename(&named, &platform("linux-64"), InstallerType::Sh), "custom.sh");
  }

  #[test]
  fn type_display_round_trips() {
    for itype in InstallerType::ALL {
      assert_eq!(itype.to_string().parse::<InstallerType>().unwrap(), itype);
    }
  }
}
