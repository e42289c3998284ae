//! Types describing a `construct.yaml` recipe.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// A list given inline, or as the path of a file holding one entry per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListOrFile {
  List(Vec<String>),
  File(String),
}

impl ListOrFile {
  /// The entries of an inline list. A file reference has no entries until
  /// the recipe loader has read it.
  pub fn entries(&self) -> &[String] {
    match self {
      ListOrFile::List(items) => items,
      ListOrFile::File(_) => &[],
    }
  }
}

/// Rewrites channel URLs recorded in the installer (`src` prefix to `dest`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelRemap {
  pub src: String,
  pub dest: String,
}

/// A Windows shortcut created by the installer.
///
/// `path`, `icon` and `options` may use `__INSTALL_PATH__` for the
/// installation directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Shortcut {
  pub name: String,
  pub path: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub icon: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<String>,
}

/// A python script the Windows installer runs after installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionalPostInstall {
  pub py_script: PathBuf,
}

/// Link shown on the last page of the Windows installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FinishLink {
  pub url: String,
  pub text: String,
}

/// A parsed build recipe.
///
/// Field names are the recipe keys. After [`super::load`] every path-like
/// field is absolute and every list holds trimmed, non-empty entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
  #[serde(deserialize_with = "scalar_string")]
  pub name: String,
  #[serde(deserialize_with = "scalar_string")]
  pub version: String,

  #[serde(default)]
  pub channels: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub channels_remap: Vec<ChannelRemap>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub specs: Option<ListOrFile>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub packages: Option<ListOrFile>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub exclude: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub menu_packages: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub installer_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub installer_filename: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub company: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_prefix: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uninstall_name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license_file: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub welcome_image: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub header_image: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub icon_image: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub welcome_image_text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub header_image_text: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pre_install: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub post_install: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pre_uninstall: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub post_install_desc: Option<String>,

  #[serde(default)]
  pub keep_pkgs: bool,
  #[serde(default)]
  pub attempt_hardlinks: bool,
  #[serde(default)]
  pub write_condarc: bool,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub conda_default_channels: Vec<String>,
  #[serde(default)]
  pub initialize_by_default: bool,
  #[serde(default)]
  pub register_python_default: bool,
  #[serde(default)]
  pub win_register_shell: bool,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub shortcuts: BTreeMap<String, Shortcut>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub optional_post_install: BTreeMap<String, OptionalPostInstall>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub finish_link: Option<FinishLink>,
}

impl Recipe {
  /// Package specs to solve.
  pub fn specs(&self) -> &[String] {
    self.specs.as_ref().map(ListOrFile::entries).unwrap_or_default()
  }

  /// Explicit package URLs, bypassing the solver.
  pub fn packages(&self) -> &[String] {
    self.packages.as_ref().map(ListOrFile::entries).unwrap_or_default()
  }
}

/// Accept a YAML string, number or boolean as a string.
///
/// Keeps `version: 1.2` from failing just because it was not quoted.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
  use serde::de::Error;

  match serde_yaml::Value::deserialize(deserializer)? {
    serde_yaml::Value::String(s) => Ok(s),
    serde_yaml::Value::Number(n) => Ok(n.to_string()),
    serde_yaml::Value::Bool(b) => Ok(b.to_string()),
    other => Err(D::Error::custom(format!("expected a string, found {other:?}"))),
  }
}
