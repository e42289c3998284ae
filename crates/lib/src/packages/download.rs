//! Downloading packages into the cache.
//!
//! Remote packages are streamed over HTTP. Packages from local `file://`
//! channels are copied. Either way the bytes land in `<file>.part` and are
//! renamed into place only once verified.

use std::path::{Path, PathBuf};

use reqwest::Url;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::PackageError;
use super::dist::Dist;
use crate::util::hash::{Checksummer, Checksums, checksum_file};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PackageError + '_ {
  move |source| PackageError::Io {
    path: path.to_path_buf(),
    source,
  }
}

fn download_error(url: &str, err: impl std::fmt::Display) -> PackageError {
  PackageError::Download {
    url: url.to_string(),
    message: err.to_string(),
  }
}

/// Where the bytes of a package come from.
enum Source {
  Local(PathBuf),
  Remote(Url),
}

impl Source {
  fn parse(url: &str) -> Result<Self, PackageError> {
    let parsed = Url::parse(url).map_err(|e| download_error(url, e))?;
    match parsed.scheme() {
      "file" => parsed
        .to_file_path()
        .map(Source::Local)
        .map_err(|()| download_error(url, "not a local file path")),
      "http" | "https" => Ok(Source::Remote(parsed)),
      other => Err(download_error(url, format!("unsupported scheme '{other}'"))),
    }
  }
}

async fn checksum_path(path: &Path) -> Result<Checksums, PackageError> {
  let owned = path.to_path_buf();
  let sums = tokio::task::spawn_blocking(move || checksum_file(&owned))
    .await
    .map_err(|e| io_error(path)(std::io::Error::other(e)))??;
  Ok(sums)
}

/// Whether a cached file can be used as is.
///
/// Files without a known checksum are trusted.
async fn cache_is_valid(dist: &Dist, path: &Path) -> Result<bool, PackageError> {
  if !path.is_file() {
    return Ok(false);
  }
  if dist.md5.is_none() && dist.sha256.is_none() {
    return Ok(true);
  }
  let sums = checksum_path(path).await?;
  match sums.verify(path, dist.md5.as_deref(), dist.sha256.as_deref()) {
    Ok(()) => Ok(true),
    Err(err) => {
      warn!(%err, "cached package is corrupt, downloading again");
      Ok(false)
    }
  }
}

/// Copy a package from a local channel into `part`.
async fn copy_local(src: &Path, part: &Path) -> Result<Checksums, PackageError> {
  fs::copy(src, part).await.map_err(io_error(src))?;
  checksum_path(part).await
}

/// Stream a package over HTTP into `part`, hashing as it goes.
async fn download_remote(client: &reqwest::Client, url: Url, part: &Path) -> Result<Checksums, PackageError> {
  let shown = url.to_string();
  let mut response = client.get(url).send().await.map_err(|e| download_error(&shown, e))?;
  if !response.status().is_success() {
    return Err(download_error(&shown, format!("HTTP {}", response.status())));
  }

  let mut file = fs::File::create(part).await.map_err(io_error(part))?;
  let mut hasher = Checksummer::new();
  while let Some(chunk) = response.chunk().await.map_err(|e| download_error(&shown, e))? {
    hasher.update(&chunk);
    file.write_all(&chunk).await.map_err(io_error(part))?;
  }
  file.flush().await.map_err(io_error(part))?;
  Ok(hasher.finish())
}

/// Make sure `dist` is present and intact in `download_dir`.
pub async fn fetch(client: &reqwest::Client, dist: &Dist, download_dir: &Path) -> Result<PathBuf, PackageError> {
  let dest = download_dir.join(&dist.filename);
  if cache_is_valid(dist, &dest).await? {
    debug!(path = ?dest, "using cached package");
    return Ok(dest);
  }

  let part = download_dir.join(format!("{}.part", dist.filename));
  let fetched = match Source::parse(&dist.url)? {
    Source::Local(src) => {
      info!(path = ?src, "copying package from local channel");
      copy_local(&src, &part).await
    }
    Source::Remote(url) => {
      info!(%url, "downloading package");
      download_remote(client, url, &part).await
    }
  };
  let verified = fetched.and_then(|sums| {
    sums
      .verify(&dest, dist.md5.as_deref(), dist.sha256.as_deref())
      .map_err(PackageError::from)
  });
  if let Err(err) = verified {
    if part.exists() {
      fs::remove_file(&part).await.map_err(io_error(&part))?;
    }
    return Err(err);
  }

  fs::rename(&part, &dest).await.map_err(io_error(&dest))?;
  info!(path = ?dest, "package ready");
  Ok(dest)
}

/// Fetch every package, one at a time. Returns the total size on disk.
pub async fn fetch_all(dists: &[Dist], download_dir: &Path) -> Result<u64, PackageError> {
  fs::create_dir_all(download_dir).await.map_err(io_error(download_dir))?;

  let client = reqwest::Client::builder()
    .user_agent(concat!("conda-bundle/", env!("CARGO_PKG_VERSION")))
    .build()
    .map_err(|e| download_error("", e))?;

  let mut total = 0;
  for dist in dists {
    let path = fetch(&client, dist, download_dir).await?;
    total += fs::metadata(&path).await.map_err(io_error(&path))?.len();
  }
  Ok(total)
}
