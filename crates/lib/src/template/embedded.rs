//! Template files compiled into the binary.

/// Self-extracting shell installer header
pub const HEADER_SH: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/header.sh"));

/// NSIS script for Windows installers
pub const MAIN_NSI: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/main.nsi.tmpl"));

/// productbuild distribution definition for macOS packages
pub const OSX_DISTRIBUTION: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/osx/distribution.xml"));

/// pkgbuild preinstall script
pub const OSX_PREINSTALL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/osx/preinstall.sh"));

/// pkgbuild postinstall script, which installs the bundled packages
pub const OSX_POSTINSTALL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/osx/postinstall.sh"));

/// License shown when the recipe has no `license_file`
pub const PLACEHOLDER_LICENSE: &str =
  include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/placeholder_license.txt"));

/// All embedded templates with their file names, for self-checks.
pub const ALL: &[(&str, &str)] = &[
  ("header.sh", HEADER_SH),
  ("main.nsi.tmpl", MAIN_NSI),
  ("osx/distribution.xml", OSX_DISTRIBUTION),
  ("osx/preinstall.sh", OSX_PREINSTALL),
  ("osx/postinstall.sh", OSX_POSTINSTALL),
  ("placeholder_license.txt", PLACEHOLDER_LICENSE),
];
