use std::fmt;
use std::str::FromStr;

use super::PlatformError;

/// Operating systems conda publishes packages for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
  Linux,
  Osx,
  Win,
}

impl Os {
  /// Detect the operating system this binary is running on.
  ///
  /// Returns `None` on systems conda does not target.
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::Osx),
      "windows" => Some(Self::Win),
      _ => None,
    }
  }

  /// The conda subdir prefix (`linux`, `osx`, `win`).
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Osx => "osx",
      Self::Win => "win",
    }
  }

  /// The name used in installer file names.
  pub fn display_name(&self) -> &'static str {
    match self {
      Self::Linux => "Linux",
      Self::Osx => "MacOSX",
      Self::Win => "Windows",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Os {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "linux" => Ok(Self::Linux),
      "osx" => Ok(Self::Osx),
      "win" => Ok(Self::Win),
      other => Err(PlatformError::UnknownOs(other.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn current_returns_supported_os() {
    assert!(Os::current().is_some(), "Current OS should be supported");
  }

  #[test]
  fn macos_uses_osx_identifier() {
    assert_eq!(Os::Osx.as_str(), "osx");
    assert_eq!(Os::Osx.display_name(), "MacOSX");
  }

  #[test]
  fn unknown_os_is_rejected() {
    assert_eq!(
      "darwin".parse::<Os>(),
      Err(PlatformError::UnknownOs("darwin".to_string()))
    );
  }
}
