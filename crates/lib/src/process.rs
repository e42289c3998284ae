//! Running external tools.
//!
//! Every piece of heavy lifting (solving, installing, compiling installers,
//! packing environments) is done by an external program. This module finds
//! those programs and runs them with captured output and uniform errors.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ToolError {
  #[error("'{tool}' not found; {hint}")]
  NotFound { tool: String, hint: String },

  #[error("failed to run '{}': {source}", tool.display())]
  Spawn { tool: PathBuf, source: std::io::Error },

  #[error("'{}' failed with exit code {code:?}: {stderr}", tool.display())]
  Failed {
    tool: PathBuf,
    code: Option<i32>,
    stderr: String,
  },
}

/// Captured result of a tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
  pub stdout: String,
  pub stderr: String,
  pub code: Option<i32>,
}

/// An external program invocation.
#[derive(Debug, Clone)]
pub struct Tool {
  program: PathBuf,
  args: Vec<OsString>,
  env: BTreeMap<String, OsString>,
}

impl Tool {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      env: BTreeMap::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, key: &str, value: impl Into<OsString>) -> Self {
    self.env.insert(key.to_string(), value.into());
    self
  }

  /// The command line, for logs and error messages.
  pub fn command_line(&self) -> String {
    let mut line = self.program.display().to_string();
    for arg in &self.args {
      line.push(' ');
      line.push_str(&arg.to_string_lossy());
    }
    line
  }

  /// Run to completion, returning the output even on a non-zero exit.
  pub async fn output(&self) -> Result<ToolOutput, ToolError> {
    info!(cmd = %self.command_line(), "running tool");

    let mut command = Command::new(&self.program);
    command.args(&self.args).envs(&self.env);

    let output = command.output().await.map_err(|source| ToolError::Spawn {
      tool: self.program.clone(),
      source,
    })?;

    let result = ToolOutput {
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
      code: output.status.code(),
    };

    if !result.stderr.is_empty() {
      debug!(stderr = %result.stderr.trim_end(), "tool stderr");
    }
    Ok(result)
  }

  /// Run to completion and fail on a non-zero exit.
  ///
  /// Returns the captured stdout.
  pub async fn run(&self) -> Result<String, ToolError> {
    let result = self.output().await?;
    if result.code != Some(0) {
      return Err(ToolError::Failed {
        tool: self.program.clone(),
        code: result.code,
        stderr: result.stderr.trim().to_string(),
      });
    }

    if !result.stdout.is_empty() {
      debug!(stdout = %result.stdout.trim_end(), "tool output");
    }
    Ok(result.stdout)
  }
}

/// Locate a tool: an explicit override from `env_var` wins, then `PATH`.
pub fn find_tool(name: &str, env_var: Option<&str>, hint: &str) -> Result<PathBuf, ToolError> {
  if let Some(var) = env_var {
    if let Some(path) = std::env::var_os(var).map(PathBuf::from) {
      if path.is_file() {
        return Ok(path);
      }
      return Err(ToolError::NotFound {
        tool: path.display().to_string(),
        hint: format!("{var} does not point to a file"),
      });
    }
  }

  which::which(name).map_err(|_| ToolError::NotFound {
    tool: name.to_string(),
    hint: hint.to_string(),
  })
}
