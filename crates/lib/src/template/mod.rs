//! Installer template rendering.
//!
//! Templates are plain text files with three kinds of markup:
//!
//! - `__KEY__` markers, replaced by a value from the "dunder" table
//! - `@KEY@` markers, replaced by a value from the "at" table
//! - `#if <selector>` / `#else` / `#endif` line blocks, kept or dropped by
//!   evaluating the selector (see [`crate::selector`])
//!
//! Keys are uppercase ASCII letters, digits and single underscores and must
//! start with a letter. Substitution is total: a marker whose key is missing
//! from its table is an error, never left in the output. Substituted values
//! are inserted verbatim and are not scanned again, so a value that happens
//! to look like a marker is never expanded.

pub mod condarc;
pub mod embedded;
pub mod nsis;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::selector::{SelectorError, evaluate};

/// Replacement values keyed by marker name (without delimiters).
pub type Values = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("unresolved template marker '{marker}'")]
  Unresolved { marker: String },

  #[error("unexpected non-ASCII character '{ch}' in: {}", path.display())]
  NonAscii { ch: char, path: PathBuf },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("line {line}: {message}")]
  Block { line: usize, message: String },

  #[error("line {line}: {source}")]
  Selector { line: usize, source: SelectorError },
}

/// Build a [`Values`] table from string pairs.
pub fn values<K, V, I>(pairs: I) -> Values
where
  I: IntoIterator<Item = (K, V)>,
  K: Into<String>,
  V: Into<String>,
{
  pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[derive(Clone, Copy)]
enum Style {
  Dunder,
  At,
}

/// Try to read a key starting at `start`. Returns the key and the index just
/// past the closing delimiter.
fn read_marker(bytes: &[u8], start: usize, style: Style) -> Option<(&str, usize)> {
  let (open_len, close): (usize, &[u8]) = match style {
    Style::Dunder => (2, b"__"),
    Style::At => (1, b"@"),
  };
  let key_start = start + open_len;
  if !bytes.get(key_start)?.is_ascii_uppercase() {
    return None;
  }

  let mut end = key_start;
  while let Some(&b) = bytes.get(end) {
    let keyish = b.is_ascii_uppercase() || b.is_ascii_digit() || (b == b'_' && bytes.get(end + 1) != Some(&b'_'));
    if !keyish {
      break;
    }
    // a lone trailing underscore before `@` is not part of the key
    if b == b'_' && matches!(style, Style::At) && bytes.get(end + 1) == Some(&b'@') {
      break;
    }
    end += 1;
  }

  if bytes[end..].starts_with(close) {
    // keys are ASCII, so the slice boundaries are char boundaries
    let key = std::str::from_utf8(&bytes[key_start..end]).ok()?;
    Some((key, end + close.len()))
  } else {
    None
  }
}

/// Substitute both marker styles in a single pass.
///
/// # Errors
///
/// Returns [`TemplateError::Unresolved`] for the first marker whose key is
/// missing from its table.
pub fn render(data: &str, dunder: &Values, at: &Values) -> Result<String, TemplateError> {
  let bytes = data.as_bytes();
  let mut out = String::with_capacity(data.len());
  let mut literal_start = 0;
  let mut i = 0;

  while i < bytes.len() {
    let marker = if bytes[i..].starts_with(b"__") {
      read_marker(bytes, i, Style::Dunder).map(|(key, end)| (key, end, dunder, format!("__{key}__")))
    } else if bytes[i] == b'@' {
      read_marker(bytes, i, Style::At).map(|(key, end)| (key, end, at, format!("@{key}@")))
    } else {
      None
    };

    match marker {
      Some((key, end, table, text)) => {
        let value = table.get(key).ok_or(TemplateError::Unresolved { marker: text })?;
        out.push_str(&data[literal_start..i]);
        out.push_str(value);
        i = end;
        literal_start = end;
      }
      None => i += 1,
    }
  }

  out.push_str(&data[literal_start..]);
  Ok(out)
}

/// Replace every `__KEY__` marker. `@` characters are left untouched.
pub fn fill_template(data: &str, dunder: &Values) -> Result<String, TemplateError> {
  render_style(data, dunder, Style::Dunder)
}

/// Replace every `@KEY@` marker. `__` sequences are left untouched.
pub fn replace_at_keys(data: &str, at: &Values) -> Result<String, TemplateError> {
  render_style(data, at, Style::At)
}

fn render_style(data: &str, table: &Values, style: Style) -> Result<String, TemplateError> {
  // the unused table is replaced by one that resolves each marker to itself
  let bytes = data.as_bytes();
  let mut passthrough = Values::new();
  let mut i = 0;
  while i < bytes.len() {
    let other = match style {
      Style::Dunder => Style::At,
      Style::At => Style::Dunder,
    };
    let starts = match other {
      Style::Dunder => bytes[i..].starts_with(b"__"),
      Style::At => bytes[i] == b'@',
    };
    if starts {
      if let Some((key, _)) = read_marker(bytes, i, other) {
        let text = match other {
          Style::Dunder => format!("__{key}__"),
          Style::At => format!("@{key}@"),
        };
        passthrough.insert(key.to_string(), text);
      }
    }
    i += 1;
  }

  match style {
    Style::Dunder => render(data, table, &passthrough),
    Style::At => render(data, &passthrough, table),
  }
}

/// Evaluate `#if` / `#else` / `#endif` blocks.
///
/// Directive lines are removed; lines of the branch whose condition holds are
/// kept. Blocks do not nest.
pub fn preprocess(data: &str, namespace: &BTreeMap<String, bool>) -> Result<String, TemplateError> {
  enum State {
    Outside,
    Then { keep: bool, opened: usize },
    Else { keep: bool, opened: usize },
  }

  let mut out = String::with_capacity(data.len());
  let mut state = State::Outside;

  for (index, line) in data.split_inclusive('\n').enumerate() {
    let number = index + 1;
    let directive = line.trim_end();

    if let Some(cond) = directive.strip_prefix("#if ") {
      if !matches!(state, State::Outside) {
        return Err(TemplateError::Block {
          line: number,
          message: "nested #if".to_string(),
        });
      }
      let keep = evaluate(cond.trim(), namespace).map_err(|source| TemplateError::Selector { line: number, source })?;
      state = State::Then { keep, opened: number };
      continue;
    }

    if directive == "#else" {
      state = match state {
        State::Then { keep, opened } => State::Else { keep: !keep, opened },
        _ => {
          return Err(TemplateError::Block {
            line: number,
            message: "#else without #if".to_string(),
          });
        }
      };
      continue;
    }

    if directive == "#endif" {
      if matches!(state, State::Outside) {
        return Err(TemplateError::Block {
          line: number,
          message: "#endif without #if".to_string(),
        });
      }
      state = State::Outside;
      continue;
    }

    let keep = match state {
      State::Outside => true,
      State::Then { keep, .. } | State::Else { keep, .. } => keep,
    };
    if keep {
      out.push_str(line);
    }
  }

  match state {
    State::Outside => Ok(out),
    State::Then { opened, .. } | State::Else { opened, .. } => Err(TemplateError::Block {
      line: opened,
      message: "#if without #endif".to_string(),
    }),
  }
}

/// Check that `data` is pure ASCII, naming `path` in the error otherwise.
pub fn ensure_ascii(data: &str, path: &Path) -> Result<(), TemplateError> {
  match data.chars().find(|c| !c.is_ascii()) {
    Some(ch) => Err(TemplateError::NonAscii {
      ch,
      path: path.to_path_buf(),
    }),
    None => Ok(()),
  }
}

/// Read a file that is going to be pasted into an installer script.
///
/// Installer scripts are ASCII-only, so any other character is an error.
pub fn read_ascii_only(path: &Path) -> Result<String, TemplateError> {
  let data = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  ensure_ascii(&data, path)?;
  Ok(data)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  fn ns(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
  }

  #[test]
  fn fill_replaces_every_dunder_key() {
    let data = "NAME=__NAME__\nVER=__VERSION__ (__PY_VER__)\n";
    let result = fill_template(
      data,
      &values([("NAME", "Miniforge"), ("VERSION", "24.1"), ("PY_VER", "3.12")]),
    )
    .unwrap();
    assert_eq!(result, "NAME=Miniforge\nVER=24.1 (3.12)\n");
  }

  #[test]
  fn fill_fails_on_missing_key() {
    let err = fill_template("__NAME__ __COMPANY__", &values([("NAME", "x")])).unwrap_err();
    assert!(matches!(err, TemplateError::Unresolved { ref marker } if marker == "__COMPANY__"));
  }

  #[test]
  fn substituted_values_are_not_rescanned() {
    let result = fill_template("__A__ __B__", &values([("A", "__B__"), ("B", "b")])).unwrap();
    assert_eq!(result, "__B__ b");
  }

  #[test]
  fn lowercase_dunders_pass_through() {
    let data = "if __name__ == '__main__': pass __X__";
    let result = fill_template(data, &values([("X", "y")])).unwrap();
    assert_eq!(result, "if __name__ == '__main__': pass y");
  }

  #[test]
  fn at_keys_leave_dunders_alone() {
    let data = "File __NAME__\n@PKG_COMMANDS@\nuser@example.com";
    let result = replace_at_keys(data, &values([("PKG_COMMANDS", "File a.tar.bz2")])).unwrap();
    assert_eq!(result, "File __NAME__\nFile a.tar.bz2\nuser@example.com");
  }

  #[test]
  fn at_keys_must_all_resolve() {
    let err = replace_at_keys("@NAME@ @SIZE@", &values([("NAME", "x")])).unwrap_err();
    assert!(matches!(err, TemplateError::Unresolved { ref marker } if marker == "@SIZE@"));
  }

  #[test]
  fn render_handles_both_styles() {
    let result = render(
      "__NAME__ is @BITS@-bit",
      &values([("NAME", "Demo")]),
      &values([("BITS", "64")]),
    )
    .unwrap();
    assert_eq!(result, "Demo is 64-bit");
  }

  #[test]
  fn preprocess_keeps_matching_branch() {
    let data = "a\n#if osx\nmac\n#else\nother\n#endif\nb\n";
    assert_eq!(preprocess(data, &ns(&[("osx", true)])).unwrap(), "a\nmac\nb\n");
    assert_eq!(preprocess(data, &ns(&[("osx", false)])).unwrap(), "a\nother\nb\n");
  }

  #[test]
  fn preprocess_without_else() {
    let data = "#if keep_pkgs and not win\nkeep\n#endif\n";
    let namespace = ns(&[("keep_pkgs", false), ("win", false)]);
    assert_eq!(preprocess(data, &namespace).unwrap(), "");
  }

  #[test]
  fn preprocess_rejects_broken_blocks() {
    let namespace = ns(&[("osx", true)]);
    assert!(matches!(
      preprocess("#if osx\n#if osx\n#endif\n", &namespace),
      Err(TemplateError::Block { line: 2, .. })
    ));
    assert!(matches!(preprocess("#endif\n", &namespace), Err(TemplateError::Block { line: 1, .. })));
    assert!(matches!(preprocess("#if osx\nx\n", &namespace), Err(TemplateError::Block { line: 1, .. })));
    assert!(matches!(
      preprocess("#if plan9\n#endif\n", &namespace),
      Err(TemplateError::Selector { line: 1, .. })
    ));
  }

  #[test]
  fn read_ascii_only_rejects_non_ascii() {
    let temp = tempdir().unwrap();
    let good = temp.path().join("good.sh");
    let bad = temp.path().join("bad.sh");
    std::fs::write(&good, "echo hello\n").unwrap();
    std::fs::write(&bad, "echo h\u{e9}llo\n").unwrap();

    assert_eq!(read_ascii_only(&good).unwrap(), "echo hello\n");
    assert!(matches!(read_ascii_only(&bad), Err(TemplateError::NonAscii { ch: '\u{e9}', .. })));
  }
}
