//! Checksum verification for pinned upstream downloads.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

use crate::error::{PackageError, Result};

/// Hex sha256 and size of the file at `path`.
pub fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let f = File::open(path).map_err(PackageError::fs("opening for checksum", path))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = r
            .read(&mut buf)
            .map_err(PackageError::fs("reading for checksum", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    let sha = format!("{:x}", hasher.finalize());
    Ok((sha, size))
}

/// Check `path` against `expected` when a pin is configured.
pub fn verify(path: &Path, expected: Option<&str>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let (actual, _size) = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(PackageError::Integrity {
            path: path.to_path_buf(),
            expected: expected.to_ascii_lowercase(),
            actual,
        });
    }
    info!("verified sha256 of {}", path.display());
    Ok(())
}
