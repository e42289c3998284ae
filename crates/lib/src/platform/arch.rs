use std::fmt;
use std::str::FromStr;

use super::PlatformError;

/// CPU architectures as spelled in conda subdirs (`linux-64`, `osx-arm64`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X86_64,
  X86,
  Aarch64,
  Arm64,
  Ppc64le,
  S390x,
  Armv7l,
}

impl Arch {
  /// Detect the CPU architecture of the host.
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X86_64),
      "x86" => Some(Self::X86),
      // conda calls Apple Silicon `arm64` and Linux ARM `aarch64`
      "aarch64" if cfg!(target_os = "macos") => Some(Self::Arm64),
      "aarch64" => Some(Self::Aarch64),
      "powerpc64" => Some(Self::Ppc64le),
      "s390x" => Some(Self::S390x),
      "arm" => Some(Self::Armv7l),
      _ => None,
    }
  }

  /// The subdir suffix for this architecture.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_64 => "64",
      Self::X86 => "32",
      Self::Aarch64 => "aarch64",
      Self::Arm64 => "arm64",
      Self::Ppc64le => "ppc64le",
      Self::S390x => "s390x",
      Self::Armv7l => "armv7l",
    }
  }

  /// The name used in installer file names (`64` becomes `x86_64`).
  pub fn display_name(&self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::X86 => "x86",
      other => other.as_str(),
    }
  }

  /// Pointer width of the target.
  pub fn bits(&self) -> u32 {
    match self {
      Self::X86 | Self::Armv7l => 32,
      _ => 64,
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "64" => Ok(Self::X86_64),
      "32" => Ok(Self::X86),
      "aarch64" => Ok(Self::Aarch64),
      "arm64" => Ok(Self::Arm64),
      "ppc64le" => Ok(Self::Ppc64le),
      "s390x" => Ok(Self::S390x),
      "armv7l" => Ok(Self::Armv7l),
      other => Err(PlatformError::UnknownArch(other.to_string())),
    }
  }
}
