//! Resolved package records.

use serde::{Deserialize, Serialize};

use super::PackageError;

/// Package archive extensions conda understands, newest format first.
pub const EXTENSIONS: [&str; 2] = [".conda", ".tar.bz2"];

/// One resolved package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dist {
  pub name: String,
  pub version: String,
  pub build: String,
  /// Channel URL, without the subdir.
  pub channel: String,
  pub subdir: String,
  pub filename: String,
  pub url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub md5: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sha256: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub size: Option<u64>,
}

impl Dist {
  /// Parse an explicit package reference: `<channel>/<subdir>/<file>[#md5]`.
  ///
  /// A 64-character fragment is taken as a SHA-256 instead.
  pub fn from_url(reference: &str) -> Result<Self, PackageError> {
    let (url, fragment) = match reference.split_once('#') {
      Some((url, hash)) => (url, Some(hash.trim())),
      None => (reference, None),
    };

    let (rest, filename) = url.rsplit_once('/').ok_or_else(|| invalid(reference, "not a URL"))?;
    let (channel, subdir) = rest.rsplit_once('/').ok_or_else(|| invalid(reference, "missing subdir"))?;
    let (name, version, build) = split_filename(filename).ok_or_else(|| invalid(reference, "not a package file"))?;

    let (md5, sha256) = match fragment {
      Some(hash) if hash.len() == 64 => (None, Some(hash.to_lowercase())),
      Some(hash) if !hash.is_empty() => (Some(hash.to_lowercase()), None),
      _ => (None, None),
    };

    Ok(Self {
      name: name.to_string(),
      version: version.to_string(),
      build: build.to_string(),
      channel: channel.to_string(),
      subdir: subdir.to_string(),
      filename: filename.to_string(),
      url: url.to_string(),
      md5,
      sha256,
      size: None,
    })
  }

  /// `name-version-build`, the file name without extension.
  pub fn dist_name(&self) -> String {
    format!("{}-{}-{}", self.name, self.version, self.build)
  }

  /// `url#md5` as recorded in `pkgs/urls`, or the bare URL.
  pub fn url_with_md5(&self) -> String {
    match &self.md5 {
      Some(md5) => format!("{}#{}", self.url, md5),
      None => self.url.clone(),
    }
  }
}

fn invalid(reference: &str, reason: &str) -> PackageError {
  PackageError::InvalidReference {
    reference: reference.to_string(),
    reason: reason.to_string(),
  }
}

/// Strip a package extension from a file name.
pub fn strip_extension(filename: &str) -> Option<&str> {
  EXTENSIONS.iter().find_map(|ext| filename.strip_suffix(ext))
}

/// Split `name-version-build.ext` into its three parts.
///
/// Names may contain dashes; versions and builds may not.
pub fn split_filename(filename: &str) -> Option<(&str, &str, &str)> {
  let stem = strip_extension(filename)?;
  let (rest, build) = stem.rsplit_once('-')?;
  let (name, version) = rest.rsplit_once('-')?;
  if name.is_empty() || version.is_empty() || build.is_empty() {
    return None;
  }
  Some((name, version, build))
}
