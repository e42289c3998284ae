//! NSIS script helpers.

/// Quote a string for use as an NSIS string literal.
pub fn str_esc(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for ch in s.chars() {
    match ch {
      '$' => out.push_str("$$"),
      '"' => out.push_str("$\\\""),
      '\n' => out.push_str("$\\n"),
      '\t' => out.push_str("$\\t"),
      other => out.push(other),
    }
  }
  out.push('"');
  out
}

/// Turn a free-form version into the `X.X.X.X` form `VIProductVersion` requires.
///
/// Non-numeric components are dropped, missing ones become `0`, extra ones
/// are cut off.
pub fn make_vi_product_version(version: &str) -> String {
  let mut parts: Vec<&str> = version
    .split('.')
    .filter(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
    .take(4)
    .collect();
  while parts.len() < 4 {
    parts.push("0");
  }
  parts.join(".")
}
