//! Package configuration.
//!
//! The built-in defaults reproduce the stock Breezehand package. An optional
//! `sdout.toml` beside the program (or passed explicitly) can rename the
//! package, repoint or pin the upstream archives, and replace the content
//! category and static asset tables.

use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{PackageError, Result};

pub const DEFAULT_NAME: &str = "breezehand";
pub const CONFIG_FILENAME: &str = "sdout.toml";

const LOADER_URL: &str =
    "https://github.com/ppkantorski/nx-ovlloader/releases/latest/download/nx-ovlloader.zip";
const OVERLAY_URL: &str =
    "https://github.com/ppkantorski/Ultrahand-Overlay/archive/refs/heads/main.zip";

/// How files inside a category source folder are selected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Any file with this extension (ASCII case-insensitive, no leading dot).
    Extension(String),
    /// Only the listed file names.
    Names(Vec<String>),
    /// Exactly one file name.
    Exact(String),
}

impl MatchRule {
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            MatchRule::Extension(ext) => Path::new(file_name)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.'))),
            MatchRule::Names(names) => names.iter().any(|n| n == file_name),
            MatchRule::Exact(name) => name == file_name,
        }
    }
}

/// One row of the category table: where the content comes from on both
/// provenances and where it lands under `config/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentCategory {
    pub name: String,
    /// Folder relative to the extracted overlay repository root.
    pub upstream: PathBuf,
    /// Folder relative to the program directory.
    pub local: PathBuf,
    /// Folder relative to the package configuration area.
    pub destination: PathBuf,
    #[serde(rename = "match")]
    pub rule: MatchRule,
}

impl ContentCategory {
    fn new(name: &str, folder: &str, rule: MatchRule) -> Self {
        Self {
            name: name.to_string(),
            upstream: PathBuf::from(folder),
            local: PathBuf::from(folder),
            destination: PathBuf::from(folder),
            rule,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamSource {
    pub url: String,
    /// File name used for the download inside the scratch directory.
    pub file_name: String,
    /// Optional pinned sha256 of the download, lowercase hex.
    #[serde(default)]
    pub sha256: Option<String>,
}

/// A locally-authored file copied verbatim into the workspace.
///
/// Both paths may contain `{name}`, replaced by the package name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticAsset {
    /// Path relative to the program directory.
    pub source: String,
    /// File path relative to the workspace root.
    pub destination: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageToml {
    name: Option<String>,
    loader: Option<UpstreamSource>,
    overlay: Option<UpstreamSource>,
    categories: Option<Vec<ContentCategory>>,
    assets: Option<Vec<StaticAsset>>,
}

#[derive(Debug, Clone)]
pub struct PackageConfig {
    pub name: String,
    /// Where local overrides and static assets are looked up.
    pub program_dir: PathBuf,
    /// Where the workspace folder and final archive are written.
    pub output_dir: PathBuf,
    /// Parent of the scratch directory; the system temp dir when unset.
    pub scratch_parent: Option<PathBuf>,
    pub loader: UpstreamSource,
    pub overlay: UpstreamSource,
    pub categories: Vec<ContentCategory>,
    pub assets: Vec<StaticAsset>,
}

impl PackageConfig {
    /// Stock configuration with everything rooted at `program_dir`.
    pub fn new(program_dir: impl Into<PathBuf>) -> Self {
        let program_dir = program_dir.into();
        Self {
            name: DEFAULT_NAME.to_string(),
            output_dir: program_dir.clone(),
            program_dir,
            scratch_parent: None,
            loader: UpstreamSource {
                url: LOADER_URL.to_string(),
                file_name: "nx-ovlloader.zip".to_string(),
                sha256: None,
            },
            overlay: UpstreamSource {
                url: OVERLAY_URL.to_string(),
                file_name: "ultrahand-main.zip".to_string(),
                sha256: None,
            },
            categories: default_categories(),
            assets: default_assets(),
        }
    }

    /// Stock configuration, overlaid with `explicit` or with `sdout.toml`
    /// from the program directory when present.
    pub fn load(program_dir: impl Into<PathBuf>, explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::new(program_dir);
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let candidate = config.program_dir.join(CONFIG_FILENAME);
                candidate.is_file().then_some(candidate)
            }
        };
        if let Some(path) = path {
            let text = fs::read_to_string(&path).map_err(|e| PackageError::Config {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            config.apply_toml(&text, &path)?;
        }
        Ok(config)
    }

    fn apply_toml(&mut self, text: &str, path: &Path) -> Result<()> {
        let parsed: PackageToml = toml::from_str(text).map_err(|e| PackageError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if let Some(name) = parsed.name {
            self.name = name.trim().to_string();
        }
        if let Some(loader) = parsed.loader {
            self.loader = loader;
        }
        if let Some(overlay) = parsed.overlay {
            self.overlay = overlay;
        }
        if let Some(categories) = parsed.categories {
            self.categories = categories;
        }
        if let Some(assets) = parsed.assets {
            self.assets = assets;
        }
        self.validate(path)
    }

    /// Reject names and paths that could escape the workspace.
    pub fn validate(&self, origin: &Path) -> Result<()> {
        let invalid = |reason: String| PackageError::Config {
            path: origin.to_path_buf(),
            reason,
        };

        if self.name.is_empty()
            || self.name.contains(['/', '\\'])
            || self.name == "."
            || self.name == ".."
        {
            return Err(invalid(format!(
                "package name '{}' must be a single path segment",
                self.name
            )));
        }
        for source in [&self.loader, &self.overlay] {
            check_relative(Path::new(&source.file_name), "file_name").map_err(&invalid)?;
            if Path::new(&source.file_name).components().count() != 1 {
                return Err(invalid(format!(
                    "file_name '{}' must be a plain file name",
                    source.file_name
                )));
            }
            if let Some(sha) = &source.sha256 {
                if sha.len() != 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid(format!("sha256 '{sha}' is not 64 hex digits")));
                }
            }
        }
        for category in &self.categories {
            let field = |f: &str| format!("categories.{}.{f}", category.name);
            check_relative(&category.upstream, &field("upstream")).map_err(&invalid)?;
            check_relative(&category.local, &field("local")).map_err(&invalid)?;
            check_relative(&category.destination, &field("destination")).map_err(&invalid)?;
        }
        for asset in &self.assets {
            check_relative(Path::new(&self.expand(&asset.source)), "assets.source")
                .map_err(&invalid)?;
            check_relative(Path::new(&self.expand(&asset.destination)), "assets.destination")
                .map_err(&invalid)?;
        }
        Ok(())
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.output_dir.join(&self.name)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.zip", self.name))
    }

    /// Configuration area relative to the workspace root: `config/<name>`.
    pub fn config_area(&self) -> PathBuf {
        Path::new("config").join(&self.name)
    }

    /// Substitute `{name}` with the package name.
    pub fn expand(&self, template: &str) -> String {
        template.replace("{name}", &self.name)
    }
}

pub fn default_categories() -> Vec<ContentCategory> {
    vec![
        ContentCategory::new("lang", "lang", MatchRule::Extension("json".into())),
        ContentCategory::new(
            "payload",
            "payloads",
            MatchRule::Exact("ultrahand_updater.bin".into()),
        ),
        ContentCategory::new(
            "themes",
            "themes",
            MatchRule::Names(vec!["ultra.ini".into(), "ultra-blue.ini".into()]),
        ),
        ContentCategory::new("sounds", "sounds", MatchRule::Extension("wav".into())),
    ]
}

pub fn default_assets() -> Vec<StaticAsset> {
    vec![
        StaticAsset {
            source: "cheat_url_txt.template".into(),
            destination: "config/{name}/cheat_url_txt.template".into(),
        },
        StaticAsset {
            source: "{name}.ovl".into(),
            destination: "switch/.overlays/{name}.ovl".into(),
        },
    ]
}

fn check_relative(path: &Path, field: &str) -> std::result::Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if path.is_absolute() {
        return Err(format!(
            "{field} must be relative, got absolute path '{}'",
            path.display()
        ));
    }
    for component in path.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return Err(format!(
                "{field} contains invalid traversal/root component in '{}'",
                path.display()
            ));
        }
    }
    Ok(())
}
