//! `.condarc` generation for installed environments.
//!
//! When a recipe sets `write_condarc`, the installer writes the recipe's
//! channels into `<prefix>/.condarc`. The commands differ per installer:
//! a heredoc for shell installers, `FileWrite` calls for NSIS.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
  Shell,
  Nsis,
}

/// Commands that write `.condarc`, one per line.
///
/// Returns a single empty line when nothing should be written, so the
/// surrounding template keeps its shape.
pub fn condarc_lines(flavor: Flavor, write_condarc: bool, default_channels: &[String], channels: &[String]) -> Vec<String> {
  if !write_condarc || (default_channels.is_empty() && channels.is_empty()) {
    return vec![String::new()];
  }

  let mut lines = vec!["# ----- add condarc".to_string()];
  match flavor {
    Flavor::Shell => {
      lines.push("cat <<EOF >\"$PREFIX/.condarc\"".to_string());
      for (key, urls) in [("default_channels", default_channels), ("channels", channels)] {
        if urls.is_empty() {
          continue;
        }
        lines.push(format!("{key}:"));
        lines.extend(urls.iter().map(|url| format!("  - {url}")));
      }
      lines.push("EOF".to_string());
    }
    Flavor::Nsis => {
      lines.push("Var /Global CONDARC".to_string());
      lines.push(r#"FileOpen $CONDARC "$INSTDIR\.condarc" w"#.to_string());
      for (key, urls) in [("default_channels", default_channels), ("channels", channels)] {
        if urls.is_empty() {
          continue;
        }
        lines.push(format!(r#"FileWrite $CONDARC "{key}:$\r$\n""#));
        lines.extend(urls.iter().map(|url| format!(r#"FileWrite $CONDARC "  - {url}$\r$\n""#)));
      }
      lines.push("FileClose $CONDARC".to_string());
    }
  }
  lines
}
