//! Error kinds surfaced by the package assembler.
//!
//! Every variant is fatal: the run aborts, the scratch directory is removed
//! and the error is handed back to the caller. Missing optional assets are
//! not errors; see [`crate::assets::AssetOutcome`].

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PackageError>;

#[derive(Error, Debug)]
pub enum PackageError {
    /// The HTTP request failed or answered with a non-success status.
    #[error("download of '{url}' failed: {reason}")]
    Network { url: String, reason: String },

    /// An archive could not be opened, read, or written.
    #[error("archive '{path}': {reason}")]
    Archive { path: PathBuf, reason: String },

    /// Scaffolding, copying, or cleanup hit an I/O error.
    #[error("{operation} '{path}' failed")]
    Filesystem {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pinned checksum did not match the downloaded artifact.
    #[error("checksum mismatch for '{path}': expected {expected}, got {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The configuration file is unreadable or invalid.
    #[error("invalid configuration '{path}': {reason}")]
    Config { path: PathBuf, reason: String },
}

impl PackageError {
    pub(crate) fn fs(
        operation: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| PackageError::Filesystem {
            operation,
            path,
            source,
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PackageError::Archive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn network(url: &str, reason: impl ToString) -> Self {
        PackageError::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
