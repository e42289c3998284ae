//! Metadata bundled into every installer.
//!
//! The bundled conda installs the packages offline from `pkgs/`; these files
//! tell it which packages to link and record where they came from.

use std::fs;
use std::path::{Path, PathBuf};

use super::PackageError;
use super::channels::final_url;
use super::dist::Dist;
use crate::recipe::ChannelRemap;

/// Paths of the written metadata files.
#[derive(Debug, Clone)]
pub struct PrecondaFiles {
  pub urls: PathBuf,
  pub urls_txt: PathBuf,
  pub env_txt: PathBuf,
  pub history: PathBuf,
}

impl PrecondaFiles {
  /// Every file, paired with its location relative to the install prefix.
  pub fn with_prefix_paths(&self) -> [(&Path, &'static str); 4] {
    [
      (self.urls.as_path(), "pkgs/urls"),
      (self.urls_txt.as_path(), "pkgs/urls.txt"),
      (self.env_txt.as_path(), "pkgs/env.txt"),
      (self.history.as_path(), "conda-meta/history"),
    ]
  }
}

/// Remapped `(url, md5)` pairs for the package set.
fn final_urls(dists: &[Dist], remaps: &[ChannelRemap]) -> Vec<(String, Option<String>)> {
  dists.iter().map(|d| (final_url(remaps, &d.url), d.md5.clone())).collect()
}

/// An `@EXPLICIT` environment file listing every package.
pub fn explicit_list(dists: &[Dist], remaps: &[ChannelRemap]) -> String {
  let mut out = String::from("@EXPLICIT\n");
  for (url, md5) in final_urls(dists, remaps) {
    out.push_str(&url);
    if let Some(md5) = md5 {
      out.push('#');
      out.push_str(&md5);
    }
    out.push('\n');
  }
  out
}

/// The `conda-meta/history` entry for the initial install.
pub fn history(dists: &[Dist], remaps: &[ChannelRemap], specs: &[String], command: &str, timestamp: &str) -> String {
  let mut lines = vec![format!("==> {timestamp} <=="), format!("# cmd: {command}")];
  for dist in dists {
    let channel = final_url(remaps, &dist.channel);
    lines.push(format!("+{channel}::{}", dist.dist_name()));
  }
  if !specs.is_empty() {
    let quoted: Vec<String> = specs.iter().map(|s| format!("'{s}'")).collect();
    lines.push(format!("# update specs: [{}]", quoted.join(", ")));
  }
  lines.join("\n") + "\n"
}

/// Write the metadata files into `dst_dir`.
pub fn write_files(
  dst_dir: &Path,
  dists: &[Dist],
  remaps: &[ChannelRemap],
  specs: &[String],
  command: &str,
) -> Result<PrecondaFiles, PackageError> {
  let write = |name: &str, content: String| -> Result<PathBuf, PackageError> {
    let path = dst_dir.join(name);
    fs::write(&path, content).map_err(|source| PackageError::Io {
      path: path.clone(),
      source,
    })?;
    Ok(path)
  };

  fs::create_dir_all(dst_dir).map_err(|source| PackageError::Io {
    path: dst_dir.to_path_buf(),
    source,
  })?;

  let urls = final_urls(dists, remaps);
  let urls_md5: String = urls
    .iter()
    .map(|(url, md5)| match md5 {
      Some(md5) => format!("{url}#{md5}\n"),
      None => format!("{url}\n"),
    })
    .collect();
  let urls_plain: String = urls.iter().map(|(url, _)| format!("{url}\n")).collect();
  let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

  Ok(PrecondaFiles {
    urls: write("urls", urls_md5)?,
    urls_txt: write("urls.txt", urls_plain)?,
    env_txt: write("env.txt", explicit_list(dists, remaps))?,
    history: write("history", history(dists, remaps, specs, command, &timestamp))?,
  })
}
