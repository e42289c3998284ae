mod build;
mod clean;
mod selftest;

use std::path::{Path, PathBuf};

use condabundle_lib::platform::paths::{absolutize, default_cache_dir};

pub use build::{BuildArgs, cmd_build};
pub use clean::cmd_clean;
pub use selftest::cmd_selftest;

/// The cache directory from `--cache-dir`/`CONDA_BUNDLE_CACHE`, or the default.
fn resolve_cache_dir(cache_dir: Option<PathBuf>) -> PathBuf {
  match cache_dir {
    Some(dir) => absolutize(Path::new("."), &dir),
    None => default_cache_dir(),
  }
}
