//! Unpacking of downloaded archives.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::{PackageError, Result};

const METADATA_DIR_PREFIX: &str = "__MACOSX";
const METADATA_FILE_MARKER: &str = "._";

/// Counts from one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub extracted: usize,
    pub skipped: usize,
}

/// True for archive entries that only carry OS metadata.
pub fn is_metadata_entry(name: &str) -> bool {
    name.starts_with(METADATA_DIR_PREFIX) || name.contains(METADATA_FILE_MARKER)
}

/// Extract every non-metadata entry of `archive` under `dest`, keeping the
/// directory structure encoded in entry names.
///
/// Entries whose names would land outside `dest` make the archive invalid.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<ExtractSummary> {
    info!("extracting {}", archive.display());
    let file = File::open(archive)
        .map_err(|e| PackageError::archive(archive, format!("cannot open: {e}")))?;
    let mut zip = ZipArchive::new(BufReader::new(file))
        .map_err(|e| PackageError::archive(archive, e))?;

    fs::create_dir_all(dest).map_err(PackageError::fs("creating directory", dest))?;

    let mut summary = ExtractSummary::default();
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| PackageError::archive(archive, e))?;
        let name = entry.name().to_string();
        if is_metadata_entry(&name) {
            debug!("skipping metadata entry {name}");
            summary.skipped += 1;
            continue;
        }

        let Some(relative) = entry.enclosed_name() else {
            return Err(PackageError::archive(
                archive,
                format!("entry '{name}' escapes the extraction directory"),
            ));
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(PackageError::fs("creating directory", &out_path))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(PackageError::fs("creating directory", parent))?;
        }
        let mut out =
            File::create(&out_path).map_err(PackageError::fs("creating file", &out_path))?;
        io::copy(&mut entry, &mut out).map_err(|e| {
            PackageError::archive(archive, format!("reading entry '{name}': {e}"))
        })?;
        summary.extracted += 1;
    }

    info!(
        "extracted {} entries to {} ({} metadata skipped)",
        summary.extracted,
        dest.display(),
        summary.skipped
    );
    Ok(summary)
}
