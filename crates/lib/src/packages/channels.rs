//! Channel URLs as recorded inside installers.
//!
//! Packages are often solved from a local or internal mirror that end users
//! cannot reach. `channels_remap` rewrites those URLs to the public location.

use tracing::warn;

use super::dist::strip_extension;
use crate::recipe::ChannelRemap;

/// Apply the first matching remap to `url`.
pub fn final_url(remaps: &[ChannelRemap], url: &str) -> String {
  for remap in remaps {
    if let Some(rest) = url.strip_prefix(&remap.src) {
      let new_url = format!("{}{rest}", remap.dest);
      let filename = url.rsplit('/').next().unwrap_or_default();
      if strip_extension(filename).is_some() {
        warn!(package = %filename, url = %new_url, "package must be made available at remapped url");
      }
      return new_url;
    }
  }
  url.to_string()
}

/// Channels to record in the installer.
///
/// Local `file://` channels that are not remapped are dropped.
pub fn final_channels(remaps: &[ChannelRemap], channels: &[String]) -> Vec<String> {
  channels
    .iter()
    .filter_map(|channel| {
      let url = final_url(remaps, channel);
      if url.starts_with("file://") {
        warn!(channel = %url, "local channel has no remap and will not be included in the installer");
        None
      } else {
        Some(url)
      }
    })
    .collect()
}
