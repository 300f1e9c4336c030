//! SD card folder layout for the package workspace.
//!
//! Creates the directory skeleton the overlay expects on the card:
//! - config/<name>/{downloads,flags,lang,notifications,payloads,sounds,themes,wallpapers}
//! - switch/.overlays, switch/.packages

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::config::PackageConfig;
use crate::error::{PackageError, Result};

/// Sub-folders of the configuration area.
pub const CONFIG_SUBDIRS: &[&str] = &[
    "downloads",
    "flags",
    "lang",
    "notifications",
    "payloads",
    "sounds",
    "themes",
    "wallpapers",
];

/// Hidden application-registration folders.
pub const APP_DIRS: &[&str] = &["switch/.overlays", "switch/.packages"];

/// Create the package folder hierarchy under `root`.
///
/// Existing directories are left alone. Category destinations from the
/// configuration are created as well so a custom category always has a
/// folder to merge into.
pub fn create_package_dirs(root: &Path, config: &PackageConfig) -> Result<()> {
    let area = root.join(config.config_area());
    let dirs = std::iter::once(area.clone())
        .chain(CONFIG_SUBDIRS.iter().map(|sub| area.join(sub)))
        .chain(config.categories.iter().map(|c| area.join(&c.destination)))
        .chain(APP_DIRS.iter().map(|dir| root.join(dir)));

    for path in dirs {
        fs::create_dir_all(&path).map_err(PackageError::fs("creating directory", &path))?;
        debug!("created {}", path.display());
    }

    Ok(())
}
