//! Builds driven end to end through the CLI.

use predicates::prelude::*;

use crate::common::TestEnv;

const RECIPE: &str = "\
name: Demo
version: 1.0
channels:
  - conda-forge
specs:
  - python 3.11*
  - zlib
exclude:
  - zlib
";

const SOLUTION: &str = r#"{
  "actions": {
    "FETCH": [
      {"fn": "python-3.11.8-h955ad1f_0.conda", "url": "https://conda.anaconda.org/conda-forge/linux-64/python-3.11.8-h955ad1f_0.conda", "md5": "aa7a52f4b7a9d5d0b1b8d0a6e4dd5a5e", "size": 10},
      {"fn": "zlib-1.2.13-h5eee18b_0.conda", "url": "https://conda.anaconda.org/conda-forge/linux-64/zlib-1.2.13-h5eee18b_0.conda", "md5": "6d7a52f4b7a9d5d0b1b8d0a6e4dd5a5e", "size": 5}
    ],
    "LINK": [
      {"dist_name": "zlib-1.2.13-h5eee18b_0", "name": "zlib"},
      {"dist_name": "python-3.11.8-h955ad1f_0", "name": "python"}
    ]
  },
  "success": true
}"#;

#[cfg(unix)]
#[test]
fn dry_run_lists_packages_without_artifacts() {
  let env = TestEnv::with_recipe(RECIPE);
  let conda = env.fake_conda(SOLUTION);

  env
    .build_cmd(&conda, "linux-64")
    .arg("--dry-run")
    .assert()
    .success()
    .stdout(predicate::str::contains(
      "  python  3.11.8  h955ad1f_0  https://conda.anaconda.org/conda-forge",
    ))
    .stdout(predicate::str::contains("zlib").not())
    .stdout(predicate::str::contains("Dry run, no installer created."));

  let calls = env.calls();
  assert!(calls.contains("create --dry-run --json"));
  assert!(calls.contains("-c conda-forge"));
  assert!(!env.output_dir().exists());
  assert!(!env.cache_dir().join("linux-64").join("python-3.11.8-h955ad1f_0.conda").exists());
}

#[cfg(unix)]
#[test]
fn solver_failure_is_reported() {
  let env = TestEnv::with_recipe(RECIPE);
  let conda = env.fake_conda(r#"{"success": false, "message": "PackagesNotFoundError: python 3.11*"}"#);

  env
    .build_cmd(&conda, "linux-64")
    .arg("--dry-run")
    .assert()
    .failure()
    .stderr(predicate::str::contains("PackagesNotFoundError"));
}

#[cfg(unix)]
#[test]
fn invalid_type_never_invokes_conda() {
  let env = TestEnv::with_recipe(&format!("{RECIPE}installer_type: exe\n"));
  let conda = env.fake_conda(SOLUTION);

  env.build_cmd(&conda, "linux-64").assert().failure();
  assert!(env.calls().is_empty());
}

#[cfg(target_os = "linux")]
#[test]
fn shell_installer_from_cached_packages() {
  let env = TestEnv::with_recipe(
    "name: Demo\nversion: 1.0\npackages:\n  - https://conda.anaconda.org/conda-forge/linux-64/zlib-1.2.13-h5eee18b_0.conda\n",
  );
  env.write_file("cache/linux-64/zlib-1.2.13-h5eee18b_0.conda", "not really a package");
  let conda = env.fake_conda("");

  env
    .build_cmd(&conda, "linux-64")
    .assert()
    .success()
    .stdout(predicate::str::contains("Successfully created"));

  let installer = env.output_dir().join("Demo-1.0-Linux-x86_64.sh");
  let content = std::fs::read(&installer).unwrap();
  assert!(content.starts_with(b"#!/bin/sh"));
  assert!(env.calls().is_empty());
}
