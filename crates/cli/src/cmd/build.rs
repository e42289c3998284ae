//! Implementation of the default command: building an installer.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::debug;

use condabundle_lib::pipeline::{BuildOptions, BuildOutcome, build};
use condabundle_lib::platform::{Platform, host_platform};

use crate::output::{Mark, installer_summary, package_table, print_json, print_rows, status};

/// Arguments of a build, as given on the command line.
pub struct BuildArgs {
  pub dir: Option<PathBuf>,
  pub output_dir: Option<PathBuf>,
  pub cache_dir: Option<PathBuf>,
  pub platform: Option<String>,
  pub conda_exe: Option<PathBuf>,
  pub dry_run: bool,
  pub verbose: bool,
}

/// Where a conda executable shipped alongside this binary would live.
fn bundled_conda_exe() -> Option<PathBuf> {
  let exe = std::env::current_exe().ok()?;
  let exe = dunce::canonicalize(&exe).unwrap_or(exe);
  Some(exe.parent()?.join("standalone_conda").join("conda.exe"))
}

fn resolve_conda_exe(conda_exe: Option<PathBuf>) -> Result<PathBuf> {
  if let Some(path) = conda_exe {
    return Ok(path);
  }
  match bundled_conda_exe() {
    Some(path) if path.is_file() => Ok(path),
    _ => bail!(
      "no conda executable: pass --conda-exe or set CONDA_BUNDLE_CONDA_EXE to a standalone conda \
       executable (available from https://repo.anaconda.com/pkgs/misc/conda-execs/)"
    ),
  }
}

fn resolve_platform(platform: Option<&str>) -> Result<Platform> {
  match platform {
    Some(s) => s.parse().with_context(|| format!("Invalid --platform '{s}'")),
    None => Ok(host_platform()?),
  }
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let start = Instant::now();
  let platform = resolve_platform(args.platform.as_deref())?;
  let conda_exe = resolve_conda_exe(args.conda_exe)?;

  let options = BuildOptions {
    recipe_dir: args.dir.unwrap_or_else(|| PathBuf::from(".")),
    output_dir: args.output_dir.unwrap_or_else(|| PathBuf::from(".")),
    cache_dir: super::resolve_cache_dir(args.cache_dir),
    platform,
    conda_exe,
    dry_run: args.dry_run,
    verbose: args.verbose,
  };
  debug!(?options, "build options");
  status(Mark::Note, &format!("platform: {platform}"));
  if args.verbose {
    status(Mark::Note, &format!(
      "conda packages download: {}",
      options.cache_dir.join(platform.subdir()).display()
    ));
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(build(&options)).context("Build failed")?;

  match outcome {
    BuildOutcome::DryRun(info) => {
      if args.verbose {
        print_json(&*info)?;
      }
      status(Mark::Note, &format!("{} packages:", info.dists.len()));
      print!("{}", package_table(&info.dists));
      println!();
      status(Mark::Note, "Dry run, no installer created.");
    }
    BuildOutcome::Created(info) => {
      if args.verbose {
        print_json(&*info)?;
      }
      status(Mark::Done, &format!("Successfully created '{}'.", display(&info.outpath)));
      print_rows(&installer_summary(&info, start.elapsed()));
    }
  }
  Ok(())
}

fn display(path: &Path) -> String {
  dunce::simplified(path).display().to_string()
}
