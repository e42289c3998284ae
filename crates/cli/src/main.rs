mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use condabundle_lib::consts::CACHE_ENV;

/// Build an installer from <DIRECTORY>/construct.yaml
#[derive(Parser)]
#[command(name = "conda-bundle")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Directory containing construct.yaml (default: current directory)
  #[arg(value_name = "DIRECTORY")]
  dir: Option<PathBuf>,

  /// Directory the installer is written to (default: current directory)
  #[arg(long, value_name = "PATH")]
  output_dir: Option<PathBuf>,

  /// Package download cache (default: ~/.conda/conda_bundle)
  #[arg(long, value_name = "PATH", env = CACHE_ENV)]
  cache_dir: Option<PathBuf>,

  /// Target platform, e.g. linux-64 or osx-arm64 (default: this machine)
  #[arg(long)]
  platform: Option<String>,

  /// Solve package specs but do not create an installer
  #[arg(long)]
  dry_run: bool,

  /// Path to a standalone conda executable
  #[arg(long, value_name = "CONDA_EXE", env = "CONDA_BUNDLE_CONDA_EXE")]
  conda_exe: Option<PathBuf>,

  /// Remove the cache directory and exit
  #[arg(long, conflicts_with_all = ["test", "dry_run"])]
  clean: bool,

  /// Run self tests and exit
  #[arg(long, conflicts_with = "dry_run")]
  test: bool,

  /// Show progress and the resolved build description
  #[arg(short, long)]
  verbose: bool,

  /// Show debug logging
  #[arg(long)]
  debug: bool,
}

fn init_logging(verbose: bool, debug: bool) {
  let default = if debug {
    "debug"
  } else if verbose {
    "info"
  } else {
    "warn"
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .without_time()
    .with_writer(std::io::stderr)
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose, cli.debug);

  if cli.clean {
    return cmd::cmd_clean(cli.cache_dir);
  }
  if cli.test {
    return cmd::cmd_selftest();
  }

  cmd::cmd_build(cmd::BuildArgs {
    dir: cli.dir,
    output_dir: cli.output_dir,
    cache_dir: cli.cache_dir,
    platform: cli.platform,
    conda_exe: cli.conda_exe,
    dry_run: cli.dry_run,
    verbose: cli.verbose,
  })
}
