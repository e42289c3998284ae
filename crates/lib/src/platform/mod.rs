//! Target and host platform handling.
//!
//! A target platform is a conda subdir string such as `linux-64`,
//! `osx-arm64` or `win-64`. It decides which installer types are legal and
//! which selector names are true while reading a recipe.

pub mod arch;
pub mod os;
pub mod paths;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use arch::Arch;
use os::Os;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
  #[error("invalid platform string '{0}'")]
  Malformed(String),

  #[error("unknown operating system '{0}'")]
  UnknownOs(String),

  #[error("unknown architecture '{0}'")]
  UnknownArch(String),

  #[error("cannot detect the platform of this machine, use --platform")]
  Undetected,
}

/// A conda target platform (e.g. "linux-64").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
}

impl Platform {
  pub fn new(os: Os, arch: Arch) -> Self {
    Self { os, arch }
  }

  /// Detect the platform of the running machine.
  ///
  /// Returns `None` if the OS or architecture has no conda subdir.
  pub fn current() -> Option<Self> {
    Some(Self {
      os: Os::current()?,
      arch: Arch::current()?,
    })
  }

  /// Returns the subdir string (e.g., "osx-arm64")
  pub fn subdir(&self) -> String {
    format!("{}-{}", self.os, self.arch)
  }

  /// Selector names and their truth value for this platform.
  ///
  /// Used both for `# [selector]` lines in recipes and for `#if` blocks in
  /// installer templates.
  pub fn namespace(&self) -> BTreeMap<String, bool> {
    let bits = self.arch.bits();
    let intel = matches!(self.arch, Arch::X86_64 | Arch::X86);
    let mut ns = BTreeMap::new();
    let mut set = |key: &str, value: bool| {
      ns.insert(key.to_string(), value);
    };

    set("linux", self.os == Os::Linux);
    set("osx", self.os == Os::Osx);
    set("win", self.os == Os::Win);
    set("unix", self.os != Os::Win);
    set("linux32", self.os == Os::Linux && bits == 32);
    set("linux64", self.os == Os::Linux && bits == 64);
    set("osx64", self.os == Os::Osx && self.arch == Arch::X86_64);
    set("win32", self.os == Os::Win && bits == 32);
    set("win64", self.os == Os::Win && bits == 64);
    set("x86", intel);
    set("x86_64", self.arch == Arch::X86_64);
    set("aarch64", self.arch == Arch::Aarch64);
    set("arm64", self.arch == Arch::Arm64);
    set("ppc64le", self.arch == Arch::Ppc64le);
    set("s390x", self.arch == Arch::S390x);
    set("armv7l", self.arch == Arch::Armv7l);
    ns
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.subdir())
  }
}

impl FromStr for Platform {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (os, arch) = s.split_once('-').ok_or_else(|| PlatformError::Malformed(s.to_string()))?;
    if arch.contains('-') {
      return Err(PlatformError::Malformed(s.to_string()));
    }
    Ok(Self {
      os: os.parse()?,
      arch: arch.parse()?,
    })
  }
}

impl serde::Serialize for Platform {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.subdir())
  }
}

/// The platform of the current machine, the default build target.
pub fn host_platform() -> Result<Platform, PlatformError> {
  Platform::current().ok_or(PlatformError::Undetected)
}
