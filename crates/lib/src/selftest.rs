//! Built-in self checks (`--test`).
//!
//! Verifies that the embedded templates render for every supported target,
//! that installer-type defaults are consistent, and which packaging tools
//! the host provides.

use std::path::{Path, PathBuf};

use crate::info::BuildInfo;
use crate::installer::{InstallerType, osxpkg, shar, winexe};
use crate::packages::Dist;
use crate::platform::Platform;
use crate::platform::os::Os;
use crate::process::find_tool;
use crate::recipe::Recipe;
use crate::template::embedded::ALL;
use crate::template::{TemplateError, ensure_ascii};

/// Targets the template checks render for.
pub const TARGETS: [&str; 7] = ["linux-64", "linux-aarch64", "linux-ppc64le", "osx-64", "osx-arm64", "win-64", "win-32"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
  Pass,
  Warn,
  Fail,
}

/// Result of a single check.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckResult {
  pub name: String,
  pub status: CheckStatus,
  pub details: Option<String>,
}

impl CheckResult {
  pub fn pass(name: &str) -> Self {
    Self {
      name: name.to_string(),
      status: CheckStatus::Pass,
      details: None,
    }
  }

  pub fn pass_with(name: &str, details: &str) -> Self {
    Self {
      details: Some(details.to_string()),
      ..Self::pass(name)
    }
  }

  pub fn warn(name: &str, details: &str) -> Self {
    Self {
      name: name.to_string(),
      status: CheckStatus::Warn,
      details: Some(details.to_string()),
    }
  }

  pub fn fail(name: &str, details: &str) -> Self {
    Self {
      name: name.to_string(),
      status: CheckStatus::Fail,
      details: Some(details.to_string()),
    }
  }
}

#[derive(Debug, Default, serde::Serialize)]
pub struct SelfTestReport {
  pub checks: Vec<CheckResult>,
}

impl SelfTestReport {
  pub fn all_passed(&self) -> bool {
    !self.checks.iter().any(|c| c.status == CheckStatus::Fail)
  }

  pub fn count(&self, status: CheckStatus) -> usize {
    self.checks.iter().filter(|c| c.status == status).count()
  }
}

/// A build description exercising every optional template section.
fn sample_info(platform: Platform, itype: InstallerType, full: bool) -> Result<BuildInfo, String> {
  let recipe = Recipe {
    name: "SelfTest".to_string(),
    version: "1.0".to_string(),
    channels: vec!["https://conda.anaconda.org/conda-forge".to_string()],
    write_condarc: full,
    keep_pkgs: full,
    attempt_hardlinks: full,
    initialize_by_default: full,
    register_python_default: full,
    post_install: full.then(|| PathBuf::from("post_install.sh")),
    icon_image: full.then(|| PathBuf::from("icon.ico")),
    ..Default::default()
  };
  let python = Dist::from_url(&format!(
    "https://conda.anaconda.org/conda-forge/{}/python-3.11.8-h0_0.conda#d41d8cd98f00b204e9800998ecf8427e",
    platform.subdir()
  ))
  .map_err(|e| e.to_string())?;

  let mut info = BuildInfo::new(
    recipe,
    platform,
    itype,
    PathBuf::from("recipe"),
    PathBuf::from("cache"),
    PathBuf::from("conda.exe"),
  );
  info.dists = vec![python];
  info.outpath = PathBuf::from("out");
  Ok(info)
}

/// Render the templates of one installer type for one target.
fn render_for(platform: Platform, itype: InstallerType, full: bool) -> Result<(), String> {
  let info = sample_info(platform, itype, full)?;
  let result = match itype {
    InstallerType::Sh => shar::header(&info, "0", 0, 0).map(drop),
    InstallerType::Pkg => osxpkg::scripts(&info).and_then(|_| osxpkg::distribution(&info)).map(drop),
    InstallerType::Exe => winexe::make_nsi(&info, Path::new("staging")).map(drop),
    InstallerType::TarBz2 => Ok(()),
  };
  result.map_err(|e| e.to_string())
}

/// Embedded templates are ASCII and render for every target and type.
pub fn check_templates() -> Vec<CheckResult> {
  let mut results = Vec::new();

  for (name, data) in ALL {
    let check = format!("template {name} is ASCII");
    match ensure_ascii(data, Path::new(name)) {
      Ok(()) => results.push(CheckResult::pass(&check)),
      Err(TemplateError::NonAscii { ch, .. }) => results.push(CheckResult::fail(&check, &format!("found {ch:?}"))),
      Err(e) => results.push(CheckResult::fail(&check, &e.to_string())),
    }
  }

  for target in TARGETS {
    let check = format!("templates render for {target}");
    let platform: Platform = match target.parse() {
      Ok(p) => p,
      Err(e) => {
        results.push(CheckResult::fail(&check, &e.to_string()));
        continue;
      }
    };
    let failure = InstallerType::allowed_for(platform.os)
      .iter()
      .flat_map(|itype| [(*itype, false), (*itype, true)])
      .find_map(|(itype, full)| render_for(platform, itype, full).err().map(|e| format!("{itype}: {e}")));
    match failure {
      None => results.push(CheckResult::pass(&check)),
      Some(e) => results.push(CheckResult::fail(&check, &e)),
    }
  }
  results
}

/// Each OS's default installer type is one it allows.
pub fn check_defaults() -> Vec<CheckResult> {
  [Os::Linux, Os::Osx, Os::Win]
    .into_iter()
    .map(|os| {
      let itype = InstallerType::default_for(os);
      let check = format!("default installer for {os}");
      if InstallerType::allowed_for(os).contains(&itype) {
        CheckResult::pass_with(&check, itype.as_str())
      } else {
        CheckResult::fail(&check, &format!("'{itype}' is not allowed for {os}"))
      }
    })
    .collect()
}

/// Packaging tools the host provides. Tools needed for the host's default
/// installer type are required.
pub fn check_host_tools(host: Os) -> Vec<CheckResult> {
  let tools: &[(&str, Option<&str>, bool, &str)] = match host {
    Os::Linux => &[("conda-pack", None, false, "needed for tar.bz2 installers")],
    Os::Osx => &[
      ("pkgbuild", None, true, "needed for pkg installers"),
      ("productbuild", None, true, "needed for pkg installers"),
      ("conda-pack", None, false, "needed for tar.bz2 installers"),
    ],
    Os::Win => &[("makensis", Some("MAKENSIS"), true, "needed for exe installers")],
  };

  tools
    .iter()
    .map(|(tool, env_var, required, purpose)| match find_tool(tool, *env_var, purpose) {
      Ok(path) => CheckResult::pass_with(tool, &path.display().to_string()),
      Err(_) if *required => CheckResult::fail(tool, &format!("not found, {purpose}")),
      Err(_) => CheckResult::warn(tool, &format!("not found, {purpose}")),
    })
    .collect()
}

/// Run every check.
pub fn run(host: Option<Os>) -> SelfTestReport {
  let mut checks = check_templates();
  checks.extend(check_defaults());
  match host {
    Some(os) => checks.extend(check_host_tools(os)),
    None => checks.push(CheckResult::warn("host tools", "unknown host operating system")),
  }
  SelfTestReport { checks }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn templates_pass_for_all_targets() {
    let failures: Vec<_> = check_templates()
      .into_iter()
      .filter(|c| c.status == CheckStatus::Fail)
      .collect();
    assert!(failures.is_empty(), "{failures:?}");
  }

  #[test]
  fn defaults_are_consistent() {
    assert!(check_defaults().iter().all(|c| c.status == CheckStatus::Pass));
  }

  #[test]
  fn report_counts_statuses() {
    let report = SelfTestReport {
      checks: vec![CheckResult::pass("a"), CheckResult::warn("b", "x"), CheckResult::fail("c", "y")],
    };
    assert!(!report.all_passed());
    assert_eq!(report.count(CheckStatus::Warn), 1);
  }
}
