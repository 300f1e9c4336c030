//! Zip handling for upstream downloads and the final package.
//!
//! Both directions drop OS metadata (macOS resource forks and Finder
//! files), but with different rules: extraction filters on archive entry
//! names, packaging filters on file names found in the workspace.

pub mod extract;
pub mod pack;

pub use extract::{extract_zip, is_metadata_entry, ExtractSummary};
pub use pack::{create_zip, is_metadata_file};
