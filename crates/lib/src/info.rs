//! Everything a backend needs to build one installer.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::installer::InstallerType;
use crate::packages::Dist;
use crate::packages::channels::final_channels;
use crate::platform::Platform;
use crate::recipe::Recipe;

/// A recipe augmented with the values derived while building.
///
/// Serializes to a flat JSON object: the recipe keys followed by the
/// derived ones.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
  #[serde(flatten)]
  pub recipe: Recipe,
  pub platform: Platform,
  pub installer_type: InstallerType,
  pub recipe_dir: PathBuf,
  pub download_dir: PathBuf,
  pub conda_exe: PathBuf,
  pub verbose: bool,
  pub dists: Vec<Dist>,
  pub approx_pkgs_size: u64,
  pub outpath: PathBuf,
}

impl BuildInfo {
  /// Start from a loaded recipe. Package and output fields are filled in
  /// later by the pipeline.
  pub fn new(
    mut recipe: Recipe,
    platform: Platform,
    installer_type: InstallerType,
    recipe_dir: PathBuf,
    download_dir: PathBuf,
    conda_exe: PathBuf,
  ) -> Self {
    for text in [&mut recipe.welcome_image_text, &mut recipe.header_image_text] {
      if text.is_none() {
        *text = Some(recipe.name.clone());
      }
    }

    Self {
      recipe,
      platform,
      installer_type,
      recipe_dir,
      download_dir,
      conda_exe,
      verbose: false,
      dists: Vec::new(),
      approx_pkgs_size: 0,
      outpath: PathBuf::new(),
    }
  }

  /// Channels recorded in the installer, after remapping.
  pub fn final_channels(&self) -> Vec<String> {
    final_channels(&self.recipe.channels_remap, &self.recipe.channels)
  }

  /// Platform selectors plus the per-build flags templates branch on.
  pub fn template_namespace(&self) -> BTreeMap<String, bool> {
    let r = &self.recipe;
    let mut ns = self.platform.namespace();
    for (key, value) in [
      ("has_license", r.license_file.is_some()),
      ("has_pre_install", r.pre_install.is_some()),
      ("has_post_install", r.post_install.is_some()),
      ("has_icon", r.icon_image.is_some()),
      ("has_header_image", r.header_image.is_some()),
      ("has_welcome_image", r.welcome_image.is_some()),
      ("has_finish_link", r.finish_link.is_some()),
      ("keep_pkgs", r.keep_pkgs),
      ("attempt_hardlinks", r.attempt_hardlinks),
      ("initialize_by_default", r.initialize_by_default),
      ("register_python_default", r.register_python_default),
    ] {
      ns.insert(key.to_string(), value);
    }
    ns
  }

  /// The command recorded in the installed environment's history.
  pub fn history_command(&self) -> String {
    format!("conda-bundle {}", self.recipe_dir.display())
  }

  /// Installation prefix name, lowercased recipe name.
  pub fn prefix_name(&self) -> String {
    self.recipe.name.to_lowercase()
  }

  /// The bundled python package, if any.
  pub fn python(&self) -> Option<&Dist> {
    self.dists.iter().find(|d| d.name == "python")
  }
}
