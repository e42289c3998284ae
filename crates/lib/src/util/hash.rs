//! Checksums for package integrity and installer payloads.
//!
//! conda repodata publishes an MD5 and, for newer packages, a SHA-256 for
//! every package file. Downloads are verified against the strongest digest
//! available; the shell installer embeds an MD5 of its payload.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use md5::Md5;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::consts::HASH_CHUNK_SIZE;

#[derive(Debug, Error)]
pub enum HashError {
  #[error("failed to read file {}: {source}", path.display())]
  ReadFile { path: PathBuf, source: std::io::Error },

  #[error("{algorithm} mismatch for {}: expected {expected}, got {actual}", path.display())]
  Mismatch {
    path: PathBuf,
    algorithm: &'static str,
    expected: String,
    actual: String,
  },
}

/// Incremental MD5 and SHA-256 of the same byte stream.
#[derive(Default)]
pub struct Checksummer {
  md5: Md5,
  sha256: Sha256,
}

/// Lowercase hex digests produced by a [`Checksummer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums {
  pub md5: String,
  pub sha256: String,
}

impl Checksummer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn update(&mut self, data: &[u8]) {
    self.md5.update(data);
    self.sha256.update(data);
  }

  pub fn finish(self) -> Checksums {
    Checksums {
      md5: hex::encode(self.md5.finalize()),
      sha256: hex::encode(self.sha256.finalize()),
    }
  }
}

impl Checksums {
  /// Compare against the expected digests, preferring SHA-256.
  ///
  /// Passes when no expected digest is known.
  pub fn verify(&self, path: &Path, md5: Option<&str>, sha256: Option<&str>) -> Result<(), HashError> {
    let (algorithm, expected, actual) = match (sha256, md5) {
      (Some(expected), _) => ("sha256", expected, &self.sha256),
      (None, Some(expected)) => ("md5", expected, &self.md5),
      (None, None) => return Ok(()),
    };

    if expected.eq_ignore_ascii_case(actual) {
      Ok(())
    } else {
      Err(HashError::Mismatch {
        path: path.to_path_buf(),
        algorithm,
        expected: expected.to_string(),
        actual: actual.clone(),
      })
    }
  }
}

fn feed_file(path: &Path, mut sink: impl FnMut(&[u8])) -> Result<(), HashError> {
  let mut file = fs::File::open(path).map_err(|source| HashError::ReadFile {
    path: path.to_path_buf(),
    source,
  })?;

  let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
  loop {
    let bytes_read = file.read(&mut buffer).map_err(|source| HashError::ReadFile {
      path: path.to_path_buf(),
      source,
    })?;
    if bytes_read == 0 {
      break;
    }
    sink(&buffer[..bytes_read]);
  }
  Ok(())
}

/// Both digests of a single file.
pub fn checksum_file(path: &Path) -> Result<Checksums, HashError> {
  let mut hasher = Checksummer::new();
  feed_file(path, |chunk| hasher.update(chunk))?;
  Ok(hasher.finish())
}

/// MD5 of the concatenation of several files, in order.
pub fn md5_files<P: AsRef<Path>>(paths: &[P]) -> Result<String, HashError> {
  let mut hasher = Md5::new();
  for path in paths {
    feed_file(path.as_ref(), |chunk| hasher.update(chunk))?;
  }
  Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";
  const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

  #[test]
  fn checksum_file_computes_both_digests() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("hello.txt");
    fs::write(&path, "hello").unwrap();

    let sums = checksum_file(&path).unwrap();
    assert_eq!(sums.md5, HELLO_MD5);
    assert_eq!(sums.sha256, HELLO_SHA256);
  }

  #[test]
  fn md5_files_hashes_the_concatenation() {
    let temp = tempdir().unwrap();
    let a = temp.path().join("a");
    let b = temp.path().join("b");
    fs::write(&a, "hel").unwrap();
    fs::write(&b, "lo").unwrap();

    assert_eq!(md5_files(&[&a, &b]).unwrap(), HELLO_MD5);
  }

  #[test]
  fn verify_prefers_sha256() {
    let sums = Checksums {
      md5: HELLO_MD5.to_string(),
      sha256: HELLO_SHA256.to_string(),
    };
    let path = Path::new("hello.txt");

    assert!(sums.verify(path, Some(HELLO_MD5), Some(HELLO_SHA256)).is_ok());
    assert!(sums.verify(path, Some(HELLO_MD5), None).is_ok());
    assert!(sums.verify(path, None, None).is_ok());

    let err = sums.verify(path, Some(HELLO_MD5), Some("00")).unwrap_err();
    assert!(matches!(err, HashError::Mismatch { algorithm: "sha256", .. }));

    let err = sums.verify(path, Some("ff"), None).unwrap_err();
    assert!(matches!(err, HashError::Mismatch { algorithm: "md5", .. }));
  }

  #[test]
  fn missing_file_is_an_error() {
    let temp = tempdir().unwrap();
    assert!(matches!(
      checksum_file(&temp.path().join("nope")),
      Err(HashError::ReadFile { .. })
    ));
  }
}
