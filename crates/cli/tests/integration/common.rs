//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own recipe, cache and output directories.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn with_recipe(content: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let env = Self { temp };
    env.write_file("recipe/construct.yaml", content);
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn recipe_dir(&self) -> PathBuf {
    self.temp.path().join("recipe")
  }

  pub fn cache_dir(&self) -> PathBuf {
    self.temp.path().join("cache")
  }

  pub fn output_dir(&self) -> PathBuf {
    self.temp.path().join("output")
  }

  /// Install a fake conda executable that prints `stdout` and records each
  /// invocation in `calls.log`.
  #[cfg(unix)]
  pub fn fake_conda(&self, stdout: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log = self.temp.path().join("calls.log");
    let script = format!(
      "#!/bin/sh\necho \"$@\" >> '{}'\ncat <<'FAKE_CONDA_EOF'\n{stdout}\nFAKE_CONDA_EOF\n",
      log.display()
    );
    let path = self.write_file("bin/conda.exe", &script);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
  }

  pub fn calls(&self) -> String {
    std::fs::read_to_string(self.temp.path().join("calls.log")).unwrap_or_default()
  }

  /// A build command pointed at this environment.
  pub fn build_cmd(&self, conda_exe: &Path, platform: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("conda-bundle");
    cmd
      .env_remove("CONDA_BUNDLE_CACHE")
      .env_remove("CONDA_BUNDLE_CONDA_EXE")
      .arg(self.recipe_dir())
      .arg("--platform")
      .arg(platform)
      .arg("--conda-exe")
      .arg(conda_exe)
      .arg("--cache-dir")
      .arg(self.cache_dir())
      .arg("--output-dir")
      .arg(self.output_dir());
    cmd
  }
}
