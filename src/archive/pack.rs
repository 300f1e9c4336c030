//! Packaging of the finished workspace into a deflated zip.
//!
//! Output is reproducible: entries are written in sorted path order with a
//! fixed timestamp and fixed permissions.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{PackageError, Result};

/// True for files that only carry OS metadata.
pub fn is_metadata_file(file_name: &str) -> bool {
    file_name.starts_with("._") || file_name == ".DS_Store"
}

/// Zip every regular file under `source_dir` into `output`, named by its
/// path relative to `source_dir`. Returns the number of files written.
pub fn create_zip(source_dir: &Path, output: &Path) -> Result<usize> {
    info!("creating {}", output.display());
    let file = File::create(output)
        .map_err(|e| PackageError::archive(output, format!("cannot create: {e}")))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut written = 0;
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source_dir).to_path_buf();
            PackageError::Filesystem {
                operation: "walking workspace",
                path,
                source: e.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if is_metadata_file(&file_name) {
            debug!("skipping metadata file {}", entry.path().display());
            continue;
        }

        let name = entry_name(source_dir, entry.path()).ok_or_else(|| {
            PackageError::archive(
                output,
                format!("non UTF-8 path '{}'", entry.path().display()),
            )
        })?;
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| PackageError::archive(output, e))?;
        let mut reader = BufReader::new(
            File::open(entry.path()).map_err(PackageError::fs("reading file", entry.path()))?,
        );
        io::copy(&mut reader, &mut writer)
            .map_err(|e| PackageError::archive(output, format!("writing '{name}': {e}")))?;
        debug!("added {name}");
        written += 1;
    }

    let mut inner = writer
        .finish()
        .map_err(|e| PackageError::archive(output, e))?;
    io::Write::flush(&mut inner).map_err(|e| PackageError::archive(output, e))?;

    info!("created {} ({written} files)", output.display());
    Ok(written)
}

/// Relative path with `/` separators, as zip entry names require.
fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}
