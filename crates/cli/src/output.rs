//! Terminal output for builds, cache cleaning and the self test.
//!
//! Results go to stdout; failures and warnings go to stderr. Colors are only
//! used when the stream is a terminal.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use condabundle_lib::info::BuildInfo;
use condabundle_lib::packages::Dist;

/// Leading mark of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
  Done,
  Note,
  Warn,
  Fail,
}

impl Mark {
  fn glyph(self) -> &'static str {
    match self {
      Mark::Done => "✓",
      Mark::Note => "•",
      Mark::Warn => "⚠",
      Mark::Fail => "✗",
    }
  }

  fn stream(self) -> Stream {
    match self {
      Mark::Done | Mark::Note => Stream::Stdout,
      Mark::Warn | Mark::Fail => Stream::Stderr,
    }
  }

  /// The glyph, colored for the stream the mark is printed to.
  pub fn colored(self) -> String {
    let glyph = self.glyph();
    match self {
      Mark::Done => glyph.if_supports_color(self.stream(), |s| s.green()).to_string(),
      Mark::Note => glyph.if_supports_color(self.stream(), |s| s.blue()).to_string(),
      Mark::Warn => glyph.if_supports_color(self.stream(), |s| s.yellow()).to_string(),
      Mark::Fail => glyph.if_supports_color(self.stream(), |s| s.red()).to_string(),
    }
  }
}

/// Print one status line.
pub fn status(mark: Mark, message: &str) {
  match mark.stream() {
    Stream::Stderr => eprintln!("{} {message}", mark.colored()),
    _ => println!("{} {message}", mark.colored()),
  }
}

/// Package sizes the way conda reports them.
pub fn human_bytes(n: u64) -> String {
  if n < 1024 {
    return format!("{n} B");
  }
  let k = n as f64 / 1024.0;
  if k < 1024.0 {
    return format!("{} KB", k.round() as u64);
  }
  let m = k / 1024.0;
  if m < 1024.0 {
    return format!("{m:.1} MB");
  }
  format!("{:.2} GB", m / 1024.0)
}

/// Wall time of a build, to a tenth of a second.
pub fn elapsed(duration: Duration) -> String {
  let secs = duration.as_secs_f64();
  if secs < 60.0 {
    format!("{secs:.1}s")
  } else {
    let whole = duration.as_secs();
    format!("{}m {:02}s", whole / 60, whole % 60)
  }
}

/// The package set as aligned `name version build channel` columns.
pub fn package_table(dists: &[Dist]) -> String {
  let width = |f: fn(&Dist) -> &str| dists.iter().map(|d| f(d).len()).max().unwrap_or(0);
  let name_w = width(|d| d.name.as_str());
  let version_w = width(|d| d.version.as_str());
  let build_w = width(|d| d.build.as_str());

  let mut table = String::new();
  for d in dists {
    let line = format!(
      "  {:name_w$}  {:version_w$}  {:build_w$}  {}",
      d.name, d.version, d.build, d.channel
    );
    let _ = writeln!(table, "{}", line.trim_end());
  }
  table
}

/// Label/value rows describing a finished installer.
pub fn installer_summary(info: &BuildInfo, took: Duration) -> Vec<(&'static str, String)> {
  vec![
    ("type", info.installer_type.as_str().to_string()),
    ("platform", info.platform.subdir()),
    ("packages", info.dists.len().to_string()),
    ("packages size", human_bytes(info.approx_pkgs_size)),
    ("built in", elapsed(took)),
  ]
}

pub fn print_rows(rows: &[(&str, String)]) {
  let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
  for (label, value) in rows {
    println!(
      "  {}  {value}",
      format!("{label:width$}").if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to render build info as JSON")?;
  println!("{json}");
  Ok(())
}
