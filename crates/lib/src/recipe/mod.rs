//! Loading and validating `construct.yaml` recipes.
//!
//! Loading happens in three steps:
//! 1. Lines carrying a `# [selector]` comment are dropped unless the
//!    selector holds for the target platform.
//! 2. The remaining text is deserialized into a [`Recipe`]; unknown keys and
//!    wrongly-shaped values are rejected by name.
//! 3. The recipe is normalized: list files are read, list entries trimmed,
//!    path-like keys made absolute against the recipe directory.

mod types;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use types::{ChannelRemap, FinishLink, ListOrFile, OptionalPostInstall, Recipe, Shortcut};

use crate::consts::RECIPE_FILE;
use crate::platform::Platform;
use crate::platform::paths::absolutize;
use crate::selector::{SelectorError, evaluate};

#[derive(Debug, Error)]
pub enum RecipeError {
  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("invalid recipe {}: {source}", path.display())]
  Parse { path: PathBuf, source: serde_yaml::Error },

  #[error("{}:{line}: {source}", path.display())]
  Selector {
    path: PathBuf,
    line: usize,
    source: SelectorError,
  },

  #[error("invalid value for '{key}': {message}")]
  InvalidValue { key: &'static str, message: String },

  #[error("found empty element in '{key}:'")]
  EmptyElement { key: &'static str },

  #[error("failed to read '{key}' list file {}: {source}", path.display())]
  ListFile {
    key: &'static str,
    path: PathBuf,
    source: std::io::Error,
  },
}

/// Location of the recipe inside a recipe directory.
pub fn recipe_path(dir: &Path) -> PathBuf {
  dir.join(RECIPE_FILE)
}

/// Split `content  # [expr]` into the selector expression, if any.
fn line_selector(line: &str) -> Option<&str> {
  let trimmed = line.trim_end();
  let inner = trimmed.strip_suffix(']')?;
  let open = inner.rfind('[')?;
  let before = inner[..open].trim_end();
  before.ends_with('#').then(|| inner[open + 1..].trim())
}

/// Drop lines whose selector is false for the namespace.
///
/// Lines without a selector are always kept.
pub fn apply_selectors(text: &str, namespace: &BTreeMap<String, bool>) -> Result<String, (usize, SelectorError)> {
  let mut out = String::with_capacity(text.len());
  for (index, line) in text.split_inclusive('\n').enumerate() {
    let keep = match line_selector(line) {
      Some(expr) => evaluate(expr, namespace).map_err(|e| (index + 1, e))?,
      None => true,
    };
    if keep {
      out.push_str(line);
    }
  }
  Ok(out)
}

/// Parse recipe text for a target platform, without touching the filesystem.
pub fn parse(text: &str, path: &Path, platform: &Platform) -> Result<Recipe, RecipeError> {
  let filtered = apply_selectors(text, &platform.namespace()).map_err(|(line, source)| RecipeError::Selector {
    path: path.to_path_buf(),
    line,
    source,
  })?;

  serde_yaml::from_str(&filtered).map_err(|source| RecipeError::Parse {
    path: path.to_path_buf(),
    source,
  })
}

/// Check the recipe's required scalar keys.
pub fn verify(recipe: &Recipe) -> Result<(), RecipeError> {
  for (key, value) in [("name", &recipe.name), ("version", &recipe.version)] {
    if value.is_empty() {
      return Err(RecipeError::InvalidValue {
        key,
        message: "must not be empty".to_string(),
      });
    }
    if let Some(ch) = value.chars().find(|c| !c.is_ascii() || c.is_whitespace() || matches!(c, '/' | '\\')) {
      return Err(RecipeError::InvalidValue {
        key,
        message: format!("unexpected character {ch:?} in '{value}'"),
      });
    }
  }

  if recipe.version.contains('-') {
    return Err(RecipeError::InvalidValue {
      key: "version",
      message: format!("'-' is not allowed in '{}'", recipe.version),
    });
  }

  if recipe.specs.is_none() && recipe.packages.is_none() {
    return Err(RecipeError::InvalidValue {
      key: "specs",
      message: "one of 'specs' or 'packages' is required".to_string(),
    });
  }

  Ok(())
}

/// Read a list file: one entry per line, blank lines and `#` comments skipped.
fn read_list_file(key: &'static str, path: &Path) -> Result<Vec<String>, RecipeError> {
  let content = fs::read_to_string(path).map_err(|source| RecipeError::ListFile {
    key,
    path: path.to_path_buf(),
    source,
  })?;
  Ok(
    content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty() && !line.starts_with('#'))
      .map(str::to_string)
      .collect(),
  )
}

/// Trim every entry and reject empty ones.
fn clean_list(key: &'static str, items: &mut [String]) -> Result<(), RecipeError> {
  for item in items.iter_mut() {
    let trimmed = item.trim();
    if trimmed.is_empty() {
      return Err(RecipeError::EmptyElement { key });
    }
    if trimmed.len() != item.len() {
      *item = trimmed.to_string();
    }
  }
  Ok(())
}

/// Resolve file references, clean lists and absolutize path-like keys.
pub fn normalize(recipe: &mut Recipe, dir: &Path) -> Result<(), RecipeError> {
  for (key, field) in [("specs", &mut recipe.specs), ("packages", &mut recipe.packages)] {
    if let Some(ListOrFile::File(file)) = field {
      let path = absolutize(dir, Path::new(file.as_str()));
      *field = Some(ListOrFile::List(read_list_file(key, &path)?));
    }
    if let Some(ListOrFile::List(items)) = field {
      clean_list(key, items)?;
    }
  }

  clean_list("channels", &mut recipe.channels)?;
  clean_list("exclude", &mut recipe.exclude)?;
  clean_list("menu_packages", &mut recipe.menu_packages)?;

  for path in [
    &mut recipe.license_file,
    &mut recipe.welcome_image,
    &mut recipe.header_image,
    &mut recipe.icon_image,
    &mut recipe.pre_install,
    &mut recipe.post_install,
    &mut recipe.pre_uninstall,
  ]
  .into_iter()
  .flatten()
  {
    *path = absolutize(dir, path);
  }

  for script in recipe.optional_post_install.values_mut() {
    script.py_script = absolutize(dir, &script.py_script);
  }

  Ok(())
}

/// Load, verify and normalize `<dir>/construct.yaml` for a target platform.
pub fn load(dir: &Path, platform: &Platform) -> Result<Recipe, RecipeError> {
  let path = recipe_path(dir);
  let text = fs::read_to_string(&path).map_err(|source| RecipeError::Read {
    path: path.clone(),
    source,
  })?;

  let mut recipe = parse(&text, &path, platform)?;
  verify(&recipe)?;
  normalize(&mut recipe, dir)?;

  debug!(name = %recipe.name, version = %recipe.version, "recipe loaded");
  Ok(recipe)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::arch::Arch;
  use crate::platform::os::Os;
  use tempfile::tempdir;

  const LINUX: Platform = Platform {
    os: Os::Linux,
    arch: Arch::X86_64,
  };
  const WIN: Platform = Platform {
    os: Os::Win,
    arch: Arch::X86_64,
  };

  fn parse_str(text: &str, platform: &Platform) -> Result<Recipe, RecipeError> {
    parse(text, Path::new("construct.yaml"), platform)
  }

  const BASIC: &str = r#"
name: Miniforge
version: 24.3.0
channels:
  - conda-forge
specs:
  - python 3.12*
  - conda
  - pywin32  # [win]
  - patchelf  # [linux and not aarch64]
license_file: EULA.txt
"#;

  #[test]
  fn selectors_filter_lines_per_platform() {
    let linux = parse_str(BASIC, &LINUX).unwrap();
    assert_eq!(linux.specs(), ["python 3.12*", "conda", "patchelf"]);

    let win = parse_str(BASIC, &WIN).unwrap();
    assert_eq!(win.specs(), ["python 3.12*", "conda", "pywin32"]);
  }

  #[test]
  fn bad_selector_reports_line() {
    let err = parse_str("name: x\nversion: 1\nspecs: [a]  # [beos]\n", &LINUX).unwrap_err();
    assert!(matches!(err, RecipeError::Selector { line: 3, .. }));
  }

  #[test]
  fn unknown_key_is_named() {
    let err = parse_str("name: x\nversion: '1'\nspecs: [a]\ninstaler_type: sh\n", &LINUX).unwrap_err();
    assert!(err.to_string().contains("instaler_type"), "{err}");
  }

  #[test]
  fn missing_required_key_is_named() {
    let err = parse_str("version: '1'\nspecs: [a]\n", &LINUX).unwrap_err();
    assert!(err.to_string().contains("name"), "{err}");
  }

  #[test]
  fn numeric_version_is_accepted() {
    let recipe = parse_str("name: x\nversion: 2\nspecs: [a]\n", &LINUX).unwrap();
    assert_eq!(recipe.version, "2");
  }

  #[test]
  fn verify_rejects_bad_versions_and_missing_specs() {
    let mut recipe = parse_str("name: x\nversion: 1.0-beta\nspecs: [a]\n", &LINUX).unwrap();
    assert!(matches!(verify(&recipe), Err(RecipeError::InvalidValue { key: "version", .. })));

    recipe.version = "1.0".to_string();
    recipe.specs = None;
    assert!(matches!(verify(&recipe), Err(RecipeError::InvalidValue { key: "specs", .. })));

    recipe.specs = Some(ListOrFile::List(vec!["a".to_string()]));
    recipe.name = "my app".to_string();
    assert!(matches!(verify(&recipe), Err(RecipeError::InvalidValue { key: "name", .. })));
  }

  #[test]
  fn path_keys_become_absolute_relative_to_recipe_dir() {
    let temp = tempdir().unwrap();
    let dir = temp.path();
    let text = "name: x\nversion: '1'\nspecs: [a]\nlicense_file: EULA.txt\nwelcome_image: img/welcome.png\n\
                header_image: ../header.png\nicon_image: icon.ico\npre_install: pre.sh\npost_install: post.sh\n\
                pre_uninstall: /abs/pre_uninstall.bat\n";
    let mut recipe = parse_str(text, &LINUX).unwrap();
    normalize(&mut recipe, dir).unwrap();

    assert_eq!(recipe.license_file, Some(dir.join("EULA.txt")));
    assert_eq!(recipe.welcome_image, Some(dir.join("img/welcome.png")));
    assert_eq!(
      recipe.header_image.as_deref(),
      dir.parent().map(|p| p.join("header.png")).as_deref()
    );
    assert_eq!(recipe.icon_image, Some(dir.join("icon.ico")));
    assert_eq!(recipe.pre_install, Some(dir.join("pre.sh")));
    assert_eq!(recipe.post_install, Some(dir.join("post.sh")));
    assert_eq!(recipe.pre_uninstall, Some(PathBuf::from("/abs/pre_uninstall.bat")));
    for path in [&recipe.license_file, &recipe.welcome_image, &recipe.header_image] {
      assert!(path.as_ref().unwrap().is_absolute());
    }
  }

  #[test]
  fn specs_file_is_read_relative_to_recipe_dir() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("specs.txt"), "# pinned\npython 3.11*\n\n  numpy  \n").unwrap();

    let mut recipe = parse_str("name: x\nversion: '1'\nspecs: specs.txt\n", &LINUX).unwrap();
    normalize(&mut recipe, temp.path()).unwrap();

    assert_eq!(recipe.specs(), ["python 3.11*", "numpy"]);
  }

  #[test]
  fn list_entries_are_trimmed_and_must_not_be_empty() {
    let mut recipe = parse_str("name: x\nversion: '1'\nspecs: ['  a ', b]\nchannels: [' conda-forge']\n", &LINUX).unwrap();
    normalize(&mut recipe, Path::new("/tmp")).unwrap();
    assert_eq!(recipe.specs(), ["a", "b"]);
    assert_eq!(recipe.channels, ["conda-forge"]);

    let mut recipe = parse_str("name: x\nversion: '1'\nspecs: [a]\nexclude: ['  ']\n", &LINUX).unwrap();
    assert!(matches!(
      normalize(&mut recipe, Path::new("/tmp")),
      Err(RecipeError::EmptyElement { key: "exclude" })
    ));
  }

  #[test]
  fn load_reads_construct_yaml() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join(RECIPE_FILE), BASIC).unwrap();

    let recipe = load(temp.path(), &LINUX).unwrap();
    assert_eq!(recipe.name, "Miniforge");
    assert_eq!(recipe.license_file, Some(temp.path().join("EULA.txt")));
  }

  #[test]
  fn load_missing_file_fails() {
    let temp = tempdir().unwrap();
    assert!(matches!(load(temp.path(), &LINUX), Err(RecipeError::Read { .. })));
  }
}
