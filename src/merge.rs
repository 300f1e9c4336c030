//! Layered merge of content categories.
//!
//! Each category is composed from an ordered list of layers copied into one
//! destination folder. Later layers overwrite same-named files from earlier
//! ones, so the fixed order upstream → local makes local files win.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{ContentCategory, MatchRule};
use crate::error::{PackageError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Extracted from a downloaded archive.
    Upstream,
    /// Supplied beside the program.
    Local,
}

/// A source folder plus the rule selecting which of its files to copy.
#[derive(Debug, Clone)]
pub struct Layer<'a> {
    pub provenance: Provenance,
    pub source: PathBuf,
    pub rule: &'a MatchRule,
}

/// What a category merge copied, per provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub category: String,
    pub upstream: usize,
    pub local: usize,
}

/// Build the layer stack for `category`, base first.
///
/// `upstream_root` is `None` when no upstream tree is available.
pub fn layers_for<'a>(
    category: &'a ContentCategory,
    upstream_root: Option<&Path>,
    program_dir: &Path,
) -> Vec<Layer<'a>> {
    let mut layers = Vec::with_capacity(2);
    if let Some(root) = upstream_root {
        layers.push(Layer {
            provenance: Provenance::Upstream,
            source: root.join(&category.upstream),
            rule: &category.rule,
        });
    }
    layers.push(Layer {
        provenance: Provenance::Local,
        source: program_dir.join(&category.local),
        rule: &category.rule,
    });
    layers
}

/// Copy every layer into `dest` in order. Missing sources are skipped.
pub fn apply_layers(layers: &[Layer<'_>], dest: &Path) -> Result<Vec<(Provenance, usize)>> {
    fs::create_dir_all(dest).map_err(PackageError::fs("creating directory", dest))?;

    let mut counts = Vec::with_capacity(layers.len());
    for layer in layers {
        if !layer.source.is_dir() {
            debug!("no {:?} source at {}", layer.provenance, layer.source.display());
            counts.push((layer.provenance, 0));
            continue;
        }
        let copied = copy_matching(&layer.source, dest, layer.rule)?;
        counts.push((layer.provenance, copied));
    }
    Ok(counts)
}

/// Merge one category into `<config_area>/<destination>`.
pub fn merge_category(
    category: &ContentCategory,
    upstream_root: Option<&Path>,
    program_dir: &Path,
    config_area: &Path,
) -> Result<MergeReport> {
    let dest = config_area.join(&category.destination);
    let layers = layers_for(category, upstream_root, program_dir);
    let counts = apply_layers(&layers, &dest)?;

    let mut report = MergeReport {
        category: category.name.clone(),
        ..MergeReport::default()
    };
    for (provenance, copied) in counts {
        match provenance {
            Provenance::Upstream => report.upstream += copied,
            Provenance::Local => report.local += copied,
        }
    }
    info!(
        "{}: {} from upstream, {} local overrides",
        report.category, report.upstream, report.local
    );
    Ok(report)
}

/// Merge every category in table order.
pub fn merge_all(
    categories: &[ContentCategory],
    upstream_root: Option<&Path>,
    program_dir: &Path,
    config_area: &Path,
) -> Result<Vec<MergeReport>> {
    categories
        .iter()
        .map(|category| merge_category(category, upstream_root, program_dir, config_area))
        .collect()
}

/// Copy the direct children of `src` accepted by `rule` into `dest`,
/// overwriting existing files. Sorted by name so logs are stable.
fn copy_matching(src: &Path, dest: &Path, rule: &MatchRule) -> Result<usize> {
    let mut entries = fs::read_dir(src)
        .map_err(PackageError::fs("reading directory", src))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(PackageError::fs("reading directory", src))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut copied = 0;
    for entry in entries {
        let src_path = entry.path();
        if !src_path.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !rule.matches(&name) {
            continue;
        }
        let dst_path = dest.join(&name);
        fs::copy(&src_path, &dst_path).map_err(PackageError::fs("copying file", &src_path))?;
        debug!("copied {} -> {}", src_path.display(), dst_path.display());
        copied += 1;
    }
    Ok(copied)
}
