//! Remote fetching of upstream archives.
//!
//! [`Fetcher`] is the seam between the pipeline and the network; the stock
//! implementation is a blocking, streaming HTTP GET.

use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{PackageError, Result};

const USER_AGENT: &str = concat!("sdout-builder/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can place the body of `url` at `dest`.
pub trait Fetcher {
    /// Write the resource to `dest`, replacing any existing file.
    /// Returns the number of bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Streams HTTP responses straight to disk. No retries.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(CONNECT_TIMEOUT)
    }

    /// Only connection setup is bounded. Body transfer has no deadline, so
    /// large archives on slow links are not cut off.
    pub fn with_connect_timeout(connect: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect)
            .timeout(None)
            .build()
            .map_err(|e| PackageError::network("<client>", format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("downloading {url}");
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| PackageError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PackageError::network(url, format!("HTTP {status}")));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(PackageError::fs("creating directory", parent))?;
        }
        let file = File::create(dest).map_err(PackageError::fs("creating download", dest))?;
        let mut writer = BufWriter::new(file);
        // copy_to streams the body in chunks instead of buffering it
        let written = response
            .copy_to(&mut writer)
            .map_err(|e| PackageError::network(url, e))?;
        writer
            .flush()
            .map_err(PackageError::fs("writing download", dest))?;

        debug!("wrote {written} bytes to {}", dest.display());
        info!("downloaded to {}", dest.display());
        Ok(written)
    }
}
