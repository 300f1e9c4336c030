//! Workspace preparation and the scratch directory guard.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{PackageError, Result};

/// Remove the workspace folder and archive left by a previous run.
///
/// Absent paths are not an error.
pub fn prepare(workspace: &Path, archive: &Path) -> Result<()> {
    if workspace.symlink_metadata().is_ok() {
        if workspace.is_dir() && !workspace.is_symlink() {
            fs::remove_dir_all(workspace)
                .map_err(PackageError::fs("removing previous workspace", workspace))?;
        } else {
            fs::remove_file(workspace)
                .map_err(PackageError::fs("removing previous workspace", workspace))?;
        }
        info!("deleted existing {}", workspace.display());
    }
    if archive.symlink_metadata().is_ok() {
        fs::remove_file(archive).map_err(PackageError::fs("removing previous archive", archive))?;
        info!("deleted existing {}", archive.display());
    }
    Ok(())
}

/// Scratch area for downloads and extraction.
///
/// The directory is removed when the guard is dropped, so every exit path
/// out of a run (including `?` propagation) leaves nothing behind.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh scratch directory under `parent`, or under the system
    /// temp directory when `parent` is `None`.
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sdout-");
        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)
                    .map_err(PackageError::fs("creating scratch parent", parent))?;
                builder
                    .tempdir_in(parent)
                    .map_err(PackageError::fs("creating scratch directory", parent))?
            }
            None => builder
                .tempdir()
                .map_err(PackageError::fs("creating scratch directory", std::env::temp_dir()))?,
        };
        debug!("scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Remove the scratch directory now, reporting failures.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("failed to remove scratch directory {}", path.display());
                Err(PackageError::Filesystem {
                    operation: "removing scratch directory",
                    path,
                    source: e,
                })
            }
        }
    }
}
