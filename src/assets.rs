//! Static assets: locally-authored files with no upstream counterpart.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::PackageConfig;
use crate::error::{PackageError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    Copied { source: PathBuf, destination: PathBuf },
    /// The source file was absent; the package is built without it.
    Missing { source: PathBuf },
}

/// Copy every configured static asset into `workspace`.
///
/// An absent source is logged and skipped. I/O failures while copying a
/// present source are fatal.
pub fn copy_static_assets(config: &PackageConfig, workspace: &Path) -> Result<Vec<AssetOutcome>> {
    let mut outcomes = Vec::with_capacity(config.assets.len());
    for asset in &config.assets {
        let source = config.program_dir.join(config.expand(&asset.source));
        let destination = workspace.join(config.expand(&asset.destination));

        if !source.is_file() {
            warn!("{} not found in program directory", source.display());
            outcomes.push(AssetOutcome::Missing { source });
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(PackageError::fs("creating directory", parent))?;
        }
        fs::copy(&source, &destination).map_err(PackageError::fs("copying file", &source))?;
        info!("copied {}", source.display());
        outcomes.push(AssetOutcome::Copied {
            source,
            destination,
        });
    }
    Ok(outcomes)
}
