//! Test utilities for condabundle-lib.
//!
//! Cross-platform helpers for tests that run shell commands, plus fixtures
//! shared by the pipeline and backend tests.

use std::path::{Path, PathBuf};

use crate::packages::Dist;

/// Returns the shell command and args to echo an environment variable.
#[cfg(unix)]
pub fn shell_echo_env(var: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), format!("echo \"${}\"", var)])
}

#[cfg(windows)]
pub fn shell_echo_env(var: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), format!("echo %{}%", var)])
}

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Write an executable shell script that prints `stdout` and exits with `code`.
///
/// Stands in for the conda executable in solver tests.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, stdout: &str, code: i32) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join(name);
  let script = format!("#!/bin/sh\ncat <<'FAKE_TOOL_EOF'\n{stdout}\nFAKE_TOOL_EOF\nexit {code}\n");
  std::fs::write(&path, script).unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// A package as the solver would report it.
pub fn dist(name: &str, version: &str, build: &str) -> Dist {
  let filename = format!("{name}-{version}-{build}.tar.bz2");
  Dist {
    name: name.to_string(),
    version: version.to_string(),
    build: build.to_string(),
    channel: "https://conda.anaconda.org/conda-forge".to_string(),
    subdir: "linux-64".to_string(),
    url: format!("https://conda.anaconda.org/conda-forge/linux-64/{filename}"),
    filename,
    md5: Some("0123456789abcdef0123456789abcdef".to_string()),
    sha256: None,
    size: Some(1000),
  }
}
