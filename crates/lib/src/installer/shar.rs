//! Self-extracting shell installers.
//!
//! Layout of the output file:
//!
//! ```text
//! header script          (ends with the boundary line)
//! conda executable       (first payload)
//! uncompressed tar       (second payload: pkgs/, conda-meta/, scripts)
//! ```
//!
//! The header knows both payload sizes and the MD5 of everything after the
//! boundary line.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use super::{InstallerError, io_error, make_executable};
use crate::consts::BUNDLED_CONDA_EXE;
use crate::info::BuildInfo;
use crate::packages::preconda;
use crate::template::condarc::{Flavor, condarc_lines};
use crate::template::embedded::HEADER_SH;
use crate::template::{preprocess, read_ascii_only, render, values};
use crate::util::hash::md5_files;

/// Write the payload tar: packages, metadata and install scripts.
fn write_payload(info: &BuildInfo, staging: &Path, tarball: &Path) -> Result<(), InstallerError> {
  let files = preconda::write_files(
    &staging.join("preconda"),
    &info.dists,
    &info.recipe.channels_remap,
    info.recipe.specs(),
    &info.history_command(),
  )?;

  let file = File::create(tarball).map_err(io_error(tarball))?;
  let mut tar = tar::Builder::new(file);
  tar.mode(tar::HeaderMode::Deterministic);

  for dist in &info.dists {
    let path = info.download_dir.join(&dist.filename);
    tar
      .append_path_with_name(&path, format!("pkgs/{}", dist.filename))
      .map_err(InstallerError::Archive)?;
  }
  for (path, name) in files.with_prefix_paths() {
    tar.append_path_with_name(path, name).map_err(InstallerError::Archive)?;
  }
  for (script, name) in [
    (&info.recipe.pre_install, "pkgs/pre_install.sh"),
    (&info.recipe.post_install, "pkgs/post_install.sh"),
  ] {
    if let Some(path) = script {
      tar.append_path_with_name(path, name).map_err(InstallerError::Archive)?;
    }
  }

  tar.into_inner().map_err(InstallerError::Archive)?;
  Ok(())
}

/// Closes the heredoc the header prints the license from.
const LICENSE_TERMINATOR: &str = "LICENSE_TEXT_END";

fn read_license(path: &Path) -> Result<String, InstallerError> {
  let text = read_ascii_only(path)?;
  if text.lines().any(|line| line.trim_end() == LICENSE_TERMINATOR) {
    return Err(InstallerError::LicenseTerminator {
      path: path.to_path_buf(),
      terminator: LICENSE_TERMINATOR,
    });
  }
  Ok(text)
}

/// Render the header script for the given payloads.
pub fn header(info: &BuildInfo, md5: &str, conda_exe_size: u64, tarball_size: u64) -> Result<String, InstallerError> {
  let license = match &info.recipe.license_file {
    Some(path) => read_license(path)?,
    None => String::new(),
  };
  let channels = info.final_channels();
  let default_prefix = info
    .recipe
    .default_prefix
    .clone()
    .unwrap_or_else(|| format!("$HOME/{}", info.prefix_name()));

  let dunder = values([
    ("NAME", info.recipe.name.clone()),
    ("VERSION", info.recipe.version.clone()),
    ("PLAT", info.platform.subdir()),
    ("MD5", md5.to_string()),
    ("DEFAULT_PREFIX", default_prefix),
    ("LICENSE", license),
    ("CONDA_EXE", BUNDLED_CONDA_EXE.to_string()),
    ("FIRST_PAYLOAD_SIZE", conda_exe_size.to_string()),
    ("SECOND_PAYLOAD_SIZE", tarball_size.to_string()),
    ("CHANNELS", channels.join(",")),
  ]);
  let condarc = condarc_lines(
    Flavor::Shell,
    info.recipe.write_condarc,
    &info.recipe.conda_default_channels,
    &channels,
  );
  let at = values([("WRITE_CONDARC", condarc.join("\n"))]);

  let data = preprocess(HEADER_SH, &info.template_namespace())?;
  let mut out = render(&data, &dunder, &at)?;
  if !out.ends_with('\n') {
    out.push('\n');
  }
  Ok(out)
}

pub fn create(info: &BuildInfo) -> Result<(), InstallerError> {
  let staging = super::scratch_dir()?;
  let tarball = staging.path().join("payload.tar");

  write_payload(info, staging.path(), &tarball)?;
  let md5 = md5_files(&[&info.conda_exe, &tarball])?;
  let conda_exe_size = fs::metadata(&info.conda_exe).map_err(io_error(&info.conda_exe))?.len();
  let tarball_size = fs::metadata(&tarball).map_err(io_error(&tarball))?.len();
  debug!(%md5, conda_exe_size, tarball_size, "payloads ready");

  let header = header(info, &md5, conda_exe_size, tarball_size)?;

  let outpath = &info.outpath;
  let mut out = File::create(outpath).map_err(io_error(outpath))?;
  out.write_all(header.as_bytes()).map_err(io_error(outpath))?;
  for payload in [info.conda_exe.as_path(), tarball.as_path()] {
    let mut src = File::open(payload).map_err(io_error(payload))?;
    std::io::copy(&mut src, &mut out).map_err(io_error(outpath))?;
  }
  out.flush().map_err(io_error(outpath))?;
  drop(out);

  make_executable(outpath)?;
  info!(path = ?outpath, "shell installer written");
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use crate::installer::InstallerType;
  use crate::recipe::Recipe;
  use crate::util::testutil::dist;

  fn build_info(dir: &Path) -> BuildInfo {
    let download_dir = dir.join("cache");
    fs::create_dir_all(&download_dir).unwrap();
    let pkg = dist("zlib", "1.2.13", "0");
    fs::write(download_dir.join(&pkg.filename), b"fake package").unwrap();
    let conda_exe = dir.join("conda.exe");
    fs::write(&conda_exe, b"#!/bin/sh\necho conda\n").unwrap();
    let post = dir.join("post.sh");
    fs::write(&post, "echo done\n").unwrap();

    let recipe = Recipe {
      name: "Demo".to_string(),
      version: "1.0".to_string(),
      channels: vec!["conda-forge".to_string()],
      post_install: Some(post),
      write_condarc: true,
      ..Default::default()
    };
    let mut info = BuildInfo::new(
      recipe,
      "linux-64".parse().unwrap(),
      InstallerType::Sh,
      dir.to_path_buf(),
      download_dir,
      conda_exe,
    );
    info.dists = vec![pkg];
    info.outpath = dir.join("Demo-1.0-Linux-x86_64.sh");
    info
  }

  #[test]
  fn header_fills_every_marker() {
    let dir = tempfile::tempdir().unwrap();
    let info = build_info(dir.path());
    let header = header(&info, "d41d8cd98f00b204e9800998ecf8427e", 10, 20).unwrap();

    assert!(header.contains("INSTALLER_NAME=\"Demo\""));
    assert!(header.contains("PREFIX=\"$HOME/demo\""));
    assert!(header.contains("head -c 10"));
    assert!(header.contains("head -c 20"));
    assert!(header.contains("export CONDA_CHANNELS=\"conda-forge\""));
    assert!(header.contains("channels:\n  - conda-forge"));
    assert!(header.contains("post_install.sh"));
    assert!(!header.contains("pre_install.sh"));
    assert!(!header.contains("md5 -q"));
    assert!(header.ends_with("### END OF HEADER ###\n"));
  }

  #[test]
  fn license_text_is_inserted_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let mut info = build_info(dir.path());
    let license = dir.path().join("LICENSE.txt");
    fs::write(&license, "Terms mention __NAME__ literally.\n").unwrap();
    info.recipe.license_file = Some(license);

    let header = header(&info, "0", 1, 1).unwrap();
    assert!(header.contains("Terms mention __NAME__ literally."));
  }

  #[test]
  fn license_closing_the_heredoc_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut info = build_info(dir.path());
    let license = dir.path().join("LICENSE.txt");
    fs::write(&license, "Terms.\nLICENSE_TEXT_END\nrm -rf stuff\n").unwrap();
    info.recipe.license_file = Some(license.clone());

    match header(&info, "0", 1, 1).unwrap_err() {
      InstallerError::LicenseTerminator { path, .. } => assert_eq!(path, license),
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn header_template_uses_the_license_terminator() {
    assert!(HEADER_SH.contains(&format!("<<'{LICENSE_TERMINATOR}'\n__LICENSE__\n{LICENSE_TERMINATOR}\n")));
  }

  #[cfg(unix)]
  #[test]
  fn create_writes_executable_installer() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let info = build_info(dir.path());
    create(&info).unwrap();

    let bytes = fs::read(&info.outpath).unwrap();
    let text = String::from_utf8_lossy(&bytes);
    let boundary = "### END OF HEADER ###\n";
    let payload_start = text.find(boundary).unwrap() + boundary.len();
    assert!(text[payload_start..].starts_with("#!/bin/sh\necho conda\n"));

    let mode = fs::metadata(&info.outpath).unwrap().permissions().mode();
    assert_eq!(mode & 0o755, 0o755);
  }

  #[test]
  fn payload_contains_packages_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let info = build_info(dir.path());
    let staging = tempfile::tempdir().unwrap();
    let tarball = staging.path().join("payload.tar");
    write_payload(&info, staging.path(), &tarball).unwrap();

    let mut archive = tar::Archive::new(File::open(&tarball).unwrap());
    let names: Vec<PathBuf> = archive
      .entries()
      .unwrap()
      .map(|e| e.unwrap().path().unwrap().into_owned())
      .collect();
    for expected in [
      "pkgs/zlib-1.2.13-0.tar.bz2",
      "pkgs/urls",
      "pkgs/urls.txt",
      "pkgs/env.txt",
      "conda-meta/history",
      "pkgs/post_install.sh",
    ] {
      assert!(names.contains(&PathBuf::from(expected)), "missing {expected}");
    }
  }
}
