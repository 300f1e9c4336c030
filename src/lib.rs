//! Builds the SD card deployment package for the Breezehand overlay.
//!
//! A run downloads the overlay loader release and the overlay sources,
//! merges the upstream content with local overrides placed beside the
//! program, and zips the result into an archive that can be extracted
//! straight onto the root of an SD card.
//!
//! # Architecture
//!
//! ```text
//! pipeline::run
//!     │
//!     ├── workspace  - remove previous output, scratch directory guard
//!     ├── layout     - fixed SD card folder skeleton
//!     ├── fetch      - Fetcher trait, streaming HTTP implementation
//!     ├── integrity  - optional sha256 pins for downloads
//!     ├── archive    - metadata-filtering extract and reproducible pack
//!     ├── merge      - ordered layers: upstream first, local overrides last
//!     └── assets     - locally-authored files with no upstream source
//! ```
//!
//! Content categories and static assets are data ([`config::ContentCategory`],
//! [`config::StaticAsset`]), so adding a category needs no new control flow.
//!
//! # Example
//!
//! ```rust,no_run
//! use sdout_builder::{pipeline, HttpFetcher, PackageConfig};
//!
//! let config = PackageConfig::load(std::env::current_dir()?, None)?;
//! let report = pipeline::run(&config, &HttpFetcher::new()?)?;
//! println!("created {}", report.archive.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod archive;
pub mod assets;
pub mod config;
pub mod error;
pub mod fetch;
pub mod integrity;
pub mod layout;
pub mod merge;
pub mod pipeline;
pub mod workspace;

pub use config::{ContentCategory, MatchRule, PackageConfig, StaticAsset, UpstreamSource};
pub use error::{PackageError, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use pipeline::{run, BuildReport};
