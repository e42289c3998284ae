//! Crate-wide constants.

/// Recipe file looked up inside the directory given on the command line.
pub const RECIPE_FILE: &str = "construct.yaml";

/// Environment variable overriding the default download cache.
pub const CACHE_ENV: &str = "CONDA_BUNDLE_CACHE";

/// Default cache location, before `~` expansion.
pub const DEFAULT_CACHE_DIR: &str = "~/.conda/conda_bundle";

/// Name under which the conda executable is shipped inside installers.
pub const BUNDLED_CONDA_EXE: &str = "_conda.exe";

/// Buffer size used when streaming files through a hasher.
pub const HASH_CHUNK_SIZE: usize = 262_144;
