//! Windows `.exe` installers, compiled by NSIS.
//!
//! `main.nsi` is generated from the embedded template. `__KEY__` values are
//! quoted NSIS strings (see [`str_esc`]); `@KEY@` values are raw NSIS
//! commands.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use tracing::info;

use super::{InstallerError, copy_file, write_file};
use crate::consts::BUNDLED_CONDA_EXE;
use crate::info::BuildInfo;
use crate::packages::preconda;
use crate::process::{Tool, find_tool};
use crate::recipe::{OptionalPostInstall, Shortcut};
use crate::template::condarc::{Flavor, condarc_lines};
use crate::template::embedded::{MAIN_NSI, PLACEHOLDER_LICENSE};
use crate::template::nsis::{make_vi_product_version, str_esc};
use crate::template::{Values, preprocess, render};

/// NSIS commands for the recipe's shortcuts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShortcutCommands {
  pub start_menu: String,
  pub desktop: String,
  pub registry: String,
  pub dpi: String,
  pub start_menu_delete: String,
  pub desktop_delete: String,
}

/// Shortcut creation, registration and removal commands.
///
/// `__INSTALL_PATH__` in a shortcut's path, icon or options is the
/// installation directory. Executables other than `cmd.exe` are registered
/// to use system DPI scaling.
pub fn shortcut_commands(shortcuts: &BTreeMap<String, Shortcut>) -> ShortcutCommands {
  let mut cmds = ShortcutCommands::default();
  let expand = |s: &str| s.replace("__INSTALL_PATH__", "$INSTDIR");

  for shortcut in shortcuts.values() {
    let name = &shortcut.name;
    let path = expand(&shortcut.path);
    let options = shortcut.options.as_deref().map(expand).unwrap_or_default();
    let icon = shortcut.icon.as_deref().map(expand).unwrap_or_else(|| path.clone());

    cmds.start_menu.push_str(&format!(
      "CreateShortCut \"$SMPROGRAMS\\${{PRODUCT_NAME}}\\{name}.lnk\" \"{path}\" \"{options}\" \"{icon}\"\n"
    ));
    cmds
      .desktop
      .push_str(&format!("CreateShortCut \"$DESKTOP\\{name}.lnk\" \"{path}\" \"{options}\" \"{icon}\"\n"));
    cmds
      .registry
      .push_str(&format!("WriteRegStr ${{PRODUCT_REGISTER_KEY}} \"${{PRODUCT_DIR_REGKEY}}\" \"\" \"{path}\"\n"));
    cmds
      .start_menu_delete
      .push_str(&format!("Delete \"$SMPROGRAMS\\${{PRODUCT_NAME}}\\{name}.lnk\"\n"));
    cmds.desktop_delete.push_str(&format!("Delete \"$DESKTOP\\{name}.lnk\"\n"));

    if path.ends_with(".exe") && !path.ends_with("\\cmd.exe") {
      cmds.dpi.push_str(&format!(
        "WriteRegStr ${{PRODUCT_REGISTER_KEY}} \"SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\AppCompatFlags\\Layers\" \"{path}\" \"~ PERPROCESSSYSTEMDPIFORCEON GDIDPISCALING DPIUNAWARE\"\n"
      ));
    }
  }
  cmds
}

/// `File` commands shipping the optional post-install python scripts, and
/// the commands running them with the installed `pythonw.exe`.
pub fn optional_post_install(scripts: &BTreeMap<String, OptionalPostInstall>) -> (String, String) {
  let mut files = String::new();
  let mut runs = String::new();
  for script in scripts.values() {
    let file_name = script
      .py_script
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    files.push_str(&format!("File {}\n", str_esc(&script.py_script.display().to_string())));
    runs.push_str(&format!(
      "DetailPrint \"Running post install: {file_name} ...\"\n    nsExec::ExecToLog '\"$INSTDIR\\pythonw.exe\" -E -s \"$INSTDIR\\{file_name}\"'\n    Pop $0\n"
    ));
  }
  (files, runs)
}

/// Commands that ship the packages and install them offline.
pub fn pkg_commands(info: &BuildInfo, channels: &[String]) -> Vec<String> {
  let mut cmds = Vec::new();
  for dist in &info.dists {
    cmds.push(String::new());
    cmds.push(format!("# --> {} <--", dist.filename));
    cmds.push(format!(
      "File {}",
      str_esc(&info.download_dir.join(&dist.filename).display().to_string())
    ));
  }

  let set_env = |key: &str, value: &str| {
    format!("System::Call 'kernel32::SetEnvironmentVariable(t,t)i(\"{key}\", \"{value}\").r0'")
  };
  cmds.push(set_env("CONDA_CHANNELS", &channels.join(",")));
  cmds.push(set_env("CONDA_PKGS_DIRS", "$INSTDIR\\pkgs"));
  cmds.push(set_env("CONDA_SAFETY_CHECKS", "disabled"));
  cmds.push(set_env("CONDA_EXTRA_SAFETY_CHECKS", "no"));
  if info.recipe.attempt_hardlinks {
    cmds.push(set_env("CONDA_ALLOW_SOFTLINKS", "false"));
  } else {
    cmds.push(set_env("CONDA_ALWAYS_COPY", "true"));
  }

  for (detail, command) in [
    (
      "Setting up the package cache ...",
      format!("\"$INSTDIR\\{BUNDLED_CONDA_EXE}\" constructor --prefix \"$INSTDIR\" --extract-conda-pkgs"),
    ),
    (
      "Setting up the base environment ...",
      format!("\"$INSTDIR\\{BUNDLED_CONDA_EXE}\" install --offline -yp \"$INSTDIR\" --file \"$INSTDIR\\pkgs\\env.txt\""),
    ),
  ] {
    cmds.push("SetDetailsPrint TextOnly".to_string());
    cmds.push(format!("DetailPrint \"{detail}\""));
    cmds.push(format!("nsExec::ExecToLog '{command}'"));
    cmds.push("Pop $0".to_string());
    cmds.push("SetDetailsPrint both".to_string());
  }

  if !info.recipe.keep_pkgs {
    cmds.push(String::new());
    cmds.push("RMDir /r \"$INSTDIR\\pkgs\"".to_string());
  }
  cmds
}

/// Generate the NSIS script. Files it references live in `staging`.
pub fn make_nsi(info: &BuildInfo, staging: &Path) -> Result<String, InstallerError> {
  let recipe = &info.recipe;
  let python = info.python().ok_or(InstallerError::MissingPython)?;
  let py_version = python.version.as_str();
  let py_ver: String = py_version.split('.').take(2).collect::<Vec<_>>().join(".");
  let bits = info.platform.arch.bits();
  let channels = info.final_channels();

  let staged = |name: &str| staging.join(name).display().to_string();
  let license = match &recipe.license_file {
    Some(path) => path.display().to_string(),
    None => staged("placeholder_license.txt"),
  };
  let text_or_name = |text: &Option<String>| text.clone().unwrap_or_else(|| recipe.name.clone());
  let (finish_text, finish_url) = match &recipe.finish_link {
    Some(link) => (link.text.clone(), link.url.clone()),
    None => (String::new(), String::new()),
  };

  let dunder: Values = [
    ("NAME", recipe.name.clone()),
    ("VERSION", recipe.version.clone()),
    ("VIPV", make_vi_product_version(&recipe.version)),
    ("COMPANY", recipe.company.clone().unwrap_or_else(|| "Unknown, Inc.".to_string())),
    ("ARCH", format!("{bits}-bit")),
    ("PY_VER", py_ver),
    ("PYVERSION", py_version.to_string()),
    ("PYVERSION_JUSTDIGITS", py_version.replace('.', "")),
    ("OUTFILE", info.outpath.display().to_string()),
    ("LICENSEFILE", license),
    (
      "DEFAULT_PREFIX",
      recipe
        .default_prefix
        .clone()
        .unwrap_or_else(|| format!("%LOCALAPPDATA%\\{}", info.prefix_name())),
    ),
    ("ALLOW_REGISTER_SHELL", if recipe.win_register_shell { "True" } else { "False" }.to_string()),
    ("FINISH_LINK_TEXT", finish_text),
    ("FINISH_LINK_URL", finish_url),
    (
      "POST_INSTALL_DESC",
      recipe
        .post_install_desc
        .clone()
        .unwrap_or_else(|| "Running post install ...".to_string()),
    ),
    ("WELCOME_IMAGE_TEXT", text_or_name(&recipe.welcome_image_text)),
    ("HEADER_IMAGE_TEXT", text_or_name(&recipe.header_image_text)),
    ("HEADERIMAGE", staged("header.bmp")),
    ("WELCOMEIMAGE", staged("welcome.bmp")),
    ("ICONFILE", staged("icon.ico")),
    ("CONDA_EXE", staged(BUNDLED_CONDA_EXE)),
    ("ENV_TXT", staged("env.txt")),
    ("URLS_FILE", staged("urls")),
    ("URLS_TXT_FILE", staged("urls.txt")),
    ("POST_INSTALL", staged("post_install.bat")),
    ("PRE_UNINSTALL", staged("pre_uninstall.bat")),
    ("CONDA_HISTORY", staged("history")),
  ]
  .into_iter()
  .map(|(k, v)| (k.to_string(), str_esc(&v)))
  .collect();

  let shortcuts = shortcut_commands(&recipe.shortcuts);
  let (post_files, post_runs) = optional_post_install(&recipe.optional_post_install);
  let condarc = condarc_lines(Flavor::Nsis, recipe.write_condarc, &recipe.conda_default_channels, &channels);
  let size_kb = info.approx_pkgs_size.div_ceil(1000);

  let at: Values = [
    ("NAME", recipe.name.clone()),
    ("BITS", bits.to_string()),
    ("PKG_COMMANDS", pkg_commands(info, &channels).join("\n    ")),
    ("WRITE_CONDARC", condarc.join("\n    ")),
    ("MENU_PKGS", recipe.menu_packages.join(" ")),
    ("SIZE", size_kb.to_string()),
    (
      "UNINSTALL_NAME",
      recipe
        .uninstall_name
        .clone()
        .unwrap_or_else(|| "${NAME} ${VERSION} (Python ${PYVERSION} ${ARCH})".to_string()),
    ),
    ("START_MENU_CREATE_SHORTCUT_EXE", shortcuts.start_menu),
    ("DESKTOP_CREATE_SHORTCUT_EXE", shortcuts.desktop),
    ("REGISTRY_INSTDIR_KEY_EXE", shortcuts.registry),
    ("REGISTRY_KEY_DPI_COMMANDS", shortcuts.dpi),
    ("START_MENU_DELETE_SHORTCUT_EXE", shortcuts.start_menu_delete),
    ("DESKTOP_DELETE_SHORTCUT_EXE", shortcuts.desktop_delete),
    ("FILE_OPTIONAL_POST_INSTALL_SCRIPTS", post_files),
    ("POST_INSTALL_SCRIPTS", post_runs),
  ]
  .into_iter()
  .map(|(k, v)| (k.to_string(), v))
  .collect();

  let data = preprocess(MAIN_NSI, &info.template_namespace())?;
  Ok(render(&data, &dunder, &at)?)
}

/// Check `makensis` runs, returning its path.
async fn verify_nsis() -> Result<std::path::PathBuf, InstallerError> {
  let makensis = find_tool("makensis", Some("MAKENSIS"), "install NSIS, e.g. `conda install nsis`")?;
  let version = Tool::new(&makensis).arg("/VERSION").run().await?;
  info!(version = %version.trim(), "found NSIS");
  Ok(makensis)
}

/// Images NSIS accepts, with the magic bytes each must start with.
const IMAGES: [(&str, &str, &str, &[u8]); 3] = [
  ("header_image", "header.bmp", "BMP", b"BM"),
  ("welcome_image", "welcome.bmp", "BMP", b"BM"),
  ("icon_image", "icon.ico", "ICO", &[0, 0, 1, 0]),
];

fn image_path<'a>(info: &'a BuildInfo, key: &str) -> Option<&'a Path> {
  let recipe = &info.recipe;
  match key {
    "header_image" => recipe.header_image.as_deref(),
    "welcome_image" => recipe.welcome_image.as_deref(),
    _ => recipe.icon_image.as_deref(),
  }
}

/// Reject images makensis cannot use. Images are shipped as is.
fn check_images(info: &BuildInfo) -> Result<(), InstallerError> {
  for (key, _, expected, magic) in IMAGES {
    let Some(path) = image_path(info, key) else {
      continue;
    };
    let mut head = [0u8; 4];
    let read = std::fs::File::open(path)
      .and_then(|mut file| file.read(&mut head))
      .map_err(super::io_error(path))?;
    if !head[..read].starts_with(magic) {
      return Err(InstallerError::ImageFormat {
        key,
        path: path.to_path_buf(),
        expected,
      });
    }
  }
  Ok(())
}

/// Copy `src` to `dst`, or write `fallback` when there is no source.
fn copy_or_write(src: Option<&Path>, dst: &Path, fallback: &str) -> Result<(), InstallerError> {
  match src {
    Some(src) => copy_file(src, dst),
    None => write_file(dst, fallback),
  }
}

/// Populate the staging directory with everything `main.nsi` references.
fn stage(info: &BuildInfo, staging: &Path) -> Result<(), InstallerError> {
  let recipe = &info.recipe;
  preconda::write_files(
    staging,
    &info.dists,
    &recipe.channels_remap,
    recipe.specs(),
    &info.history_command(),
  )?;
  copy_file(&info.conda_exe, &staging.join(BUNDLED_CONDA_EXE))?;

  copy_or_write(
    recipe.post_install.as_deref(),
    &staging.join("post_install.bat"),
    ":: this is an empty post install .bat script\n",
  )?;
  copy_or_write(
    recipe.pre_uninstall.as_deref(),
    &staging.join("pre_uninstall.bat"),
    ":: this is an empty pre uninstall .bat script\n",
  )?;
  if recipe.license_file.is_none() {
    write_file(&staging.join("placeholder_license.txt"), PLACEHOLDER_LICENSE)?;
  }

  for (key, name, _, _) in IMAGES {
    if let Some(path) = image_path(info, key) {
      copy_file(path, &staging.join(name))?;
    }
  }
  Ok(())
}

pub async fn create(info: &BuildInfo) -> Result<(), InstallerError> {
  if info.recipe.pre_install.is_some() {
    return Err(InstallerError::PreInstallUnsupported);
  }
  if info.python().is_none() {
    return Err(InstallerError::MissingPython);
  }
  check_images(info)?;
  let makensis = verify_nsis().await?;

  let staging = super::scratch_dir()?;
  stage(info, staging.path())?;
  let nsi = staging.path().join("main.nsi");
  write_file(&nsi, &make_nsi(info, staging.path())?)?;
  info!(path = ?nsi, "wrote NSIS script");

  let verbosity = if info.verbose { "/V4" } else { "/V2" };
  let output = Tool::new(makensis).arg(verbosity).arg(&nsi).run().await?;
  if info.verbose {
    info!(output = %output.trim_end(), "makensis output");
  }

  info!(path = ?info.outpath, "Windows installer written");
  Ok(())
}
