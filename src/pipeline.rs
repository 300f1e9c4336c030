//! The package build pipeline.
//!
//! One strictly sequential run:
//!
//! ```text
//! prepare → scaffold → fetch(loader) → extract(loader) → fetch(overlay)
//!   → extract(overlay) → merge(categories) → copy(static assets)
//!   → cleanup(scratch) → package
//! ```
//!
//! Any failure aborts the rest of the sequence. The scratch directory is a
//! drop guard, so it is gone by the time an error reaches the caller.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::archive::{create_zip, extract_zip};
use crate::assets::{copy_static_assets, AssetOutcome};
use crate::config::{PackageConfig, UpstreamSource};
use crate::error::{PackageError, Result};
use crate::fetch::Fetcher;
use crate::integrity;
use crate::layout::create_package_dirs;
use crate::merge::{merge_all, MergeReport};
use crate::workspace::{prepare, ScratchDir};

/// Folder inside the scratch directory receiving the overlay sources.
const OVERLAY_EXTRACT_DIR: &str = "overlay-src";

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub workspace: PathBuf,
    pub archive: PathBuf,
    pub files_packed: usize,
    pub merges: Vec<MergeReport>,
    pub assets: Vec<AssetOutcome>,
}

impl BuildReport {
    pub fn missing_assets(&self) -> impl Iterator<Item = &Path> {
        self.assets.iter().filter_map(|outcome| match outcome {
            AssetOutcome::Missing { source } => Some(source.as_path()),
            AssetOutcome::Copied { .. } => None,
        })
    }
}

/// Build the workspace folder and the final archive described by `config`.
pub fn run(config: &PackageConfig, fetcher: &dyn Fetcher) -> Result<BuildReport> {
    let workspace = config.workspace_dir();
    let archive = config.archive_path();

    info!("cleaning up previous builds");
    prepare(&workspace, &archive)?;

    info!("creating folder structure");
    create_package_dirs(&workspace, config)?;

    let scratch = ScratchDir::create(config.scratch_parent.as_deref())?;
    let (merges, assets) = populate(config, fetcher, &scratch, &workspace)?;

    info!("cleaning up temporary files");
    scratch.close()?;

    let files_packed = create_zip(&workspace, &archive)?;

    Ok(BuildReport {
        workspace,
        archive,
        files_packed,
        merges,
        assets,
    })
}

fn populate(
    config: &PackageConfig,
    fetcher: &dyn Fetcher,
    scratch: &ScratchDir,
    workspace: &Path,
) -> Result<(Vec<MergeReport>, Vec<AssetOutcome>)> {
    let loader_zip = fetch_verified(fetcher, &config.loader, scratch)?;
    extract_zip(&loader_zip, workspace)?;

    let overlay_zip = fetch_verified(fetcher, &config.overlay, scratch)?;
    let overlay_dir = scratch.join(OVERLAY_EXTRACT_DIR);
    extract_zip(&overlay_zip, &overlay_dir)?;
    let upstream_root = locate_upstream_root(&overlay_dir, &overlay_zip)?;

    info!("merging content from {}", upstream_root.display());
    let merges = merge_all(
        &config.categories,
        Some(upstream_root.as_path()),
        &config.program_dir,
        &workspace.join(config.config_area()),
    )?;

    let assets = copy_static_assets(config, workspace)?;
    Ok((merges, assets))
}

fn fetch_verified(
    fetcher: &dyn Fetcher,
    source: &UpstreamSource,
    scratch: &ScratchDir,
) -> Result<PathBuf> {
    let dest = scratch.join(&source.file_name);
    fetcher.fetch(&source.url, &dest)?;
    integrity::verify(&dest, source.sha256.as_deref())?;
    Ok(dest)
}

/// Source archives wrap the repository in one top-level folder
/// (`<repo>-<ref>/`). Pick the first directory by name.
fn locate_upstream_root(extract_dir: &Path, archive: &Path) -> Result<PathBuf> {
    let mut dirs = fs::read_dir(extract_dir)
        .map_err(PackageError::fs("reading directory", extract_dir))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(PackageError::fs("reading directory", extract_dir))?;
    dirs.retain(|path| path.is_dir());
    dirs.sort();
    dirs.into_iter().next().ok_or_else(|| {
        PackageError::archive(archive, "could not find the extracted repository folder")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::fixtures::{entry_names, write_zip};
    use crate::archive::{is_metadata_entry, is_metadata_file};
    use std::collections::HashMap;
    use std::io::Read;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const LOADER_URL: &str = "https://fixtures.invalid/nx-ovlloader.zip";
    const OVERLAY_URL: &str = "https://fixtures.invalid/ultrahand-main.zip";

    /// Serves fixture files by URL.
    struct FixtureFetcher {
        files: HashMap<String, PathBuf>,
    }

    impl Fetcher for FixtureFetcher {
        fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
            let src = self
                .files
                .get(url)
                .ok_or_else(|| PackageError::network(url, "HTTP 404 Not Found"))?;
            fs::copy(src, dest).map_err(PackageError::fs("copying fixture", src))
        }
    }

    struct FailingFetcher;

    impl Fetcher for FailingFetcher {
        fn fetch(&self, url: &str, _dest: &Path) -> Result<u64> {
            Err(PackageError::network(url, "connection refused"))
        }
    }

    struct Env {
        _temp: TempDir,
        program: PathBuf,
        scratch_parent: PathBuf,
        fetcher: FixtureFetcher,
    }

    impl Env {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let program = temp.path().join("program");
            let fixtures = temp.path().join("fixtures");
            let scratch_parent = temp.path().join("scratch");
            fs::create_dir_all(&program).unwrap();
            fs::create_dir_all(&fixtures).unwrap();

            let loader = fixtures.join("loader.zip");
            write_zip(
                &loader,
                &[
                    ("atmosphere/contents/420000000007E51A/exefs.nsp", "loader"),
                    ("atmosphere/contents/420000000007E51A/._exefs.nsp", "fork"),
                    ("__MACOSX/atmosphere/._contents", "fork"),
                ],
            );
            let overlay = fixtures.join("overlay.zip");
            write_zip(
                &overlay,
                &[
                    ("Ultrahand-Overlay-main/", ""),
                    ("Ultrahand-Overlay-main/lang/en.json", "upstream-en"),
                    ("Ultrahand-Overlay-main/lang/de.json", "upstream-de"),
                    ("Ultrahand-Overlay-main/lang/._en.json", "fork"),
                    ("Ultrahand-Overlay-main/themes/ultra.ini", "upstream-ultra"),
                    ("Ultrahand-Overlay-main/themes/ultra-blue.ini", "upstream-blue"),
                    (
                        "Ultrahand-Overlay-main/payloads/ultrahand_updater.bin",
                        "upstream-payload",
                    ),
                    ("Ultrahand-Overlay-main/source/main.cpp", "int main() {}"),
                ],
            );

            let files = HashMap::from([
                (LOADER_URL.to_string(), loader),
                (OVERLAY_URL.to_string(), overlay),
            ]);
            Env {
                _temp: temp,
                program,
                scratch_parent,
                fetcher: FixtureFetcher { files },
            }
        }

        fn config(&self) -> PackageConfig {
            let mut config = PackageConfig::new(&self.program);
            config.loader.url = LOADER_URL.to_string();
            config.overlay.url = OVERLAY_URL.to_string();
            config.scratch_parent = Some(self.scratch_parent.clone());
            config
        }

        fn local(&self, rel: &str, content: &str) {
            let path = self.program.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn scratch_is_empty(&self) -> bool {
            fs::read_dir(&self.scratch_parent)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(true)
        }
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn read_entry(archive: &Path, name: &str) -> String {
        let mut zip = zip::ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
        let mut entry = zip.by_name(name).unwrap();
        let mut out = String::new();
        entry.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn full_run_merges_with_local_precedence() {
        let env = Env::new();
        env.local("lang/en.json", "local-en");
        env.local("themes/ultra-blue.ini", "local-blue");
        env.local("breezehand.ovl", "ovl-module");
        let config = env.config();

        let report = run(&config, &env.fetcher).unwrap();

        let area = report.workspace.join("config/breezehand");
        assert_eq!(fs::read_to_string(area.join("lang/en.json")).unwrap(), "local-en");
        assert_eq!(fs::read_to_string(area.join("lang/de.json")).unwrap(), "upstream-de");
        assert_eq!(
            fs::read_to_string(area.join("themes/ultra.ini")).unwrap(),
            "upstream-ultra"
        );
        assert_eq!(
            fs::read_to_string(area.join("themes/ultra-blue.ini")).unwrap(),
            "local-blue"
        );
        assert_eq!(
            fs::read_to_string(area.join("payloads/ultrahand_updater.bin")).unwrap(),
            "upstream-payload"
        );
        assert!(area.join("sounds").is_dir());
        assert_eq!(fs::read_dir(area.join("sounds")).unwrap().count(), 0);
        assert!(report
            .workspace
            .join("atmosphere/contents/420000000007E51A/exefs.nsp")
            .is_file());

        assert_eq!(
            read_entry(&report.archive, "config/breezehand/lang/en.json"),
            "local-en"
        );
        assert_eq!(
            read_entry(&report.archive, "switch/.overlays/breezehand.ovl"),
            "ovl-module"
        );
        assert!(env.scratch_is_empty());
    }

    #[test]
    fn archive_never_contains_metadata_entries() {
        let env = Env::new();
        env.local("themes/._ultra.ini", "fork");
        env.local("themes/ultra.ini", "local-ultra");
        let config = env.config();
        let report = run(&config, &env.fetcher).unwrap();
        fs::write(report.workspace.join(".DS_Store"), "finder").unwrap();
        create_zip(&report.workspace, &report.archive).unwrap();

        for name in entry_names(&report.archive) {
            let file_name = name.rsplit('/').next().unwrap();
            assert!(!is_metadata_entry(&name), "metadata entry {name}");
            assert!(!is_metadata_file(file_name), "metadata file {name}");
        }
    }

    #[test]
    fn missing_template_is_a_warning_not_a_failure() {
        let env = Env::new();
        env.local("breezehand.ovl", "ovl-module");
        let config = env.config();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();

        let report =
            tracing::subscriber::with_default(subscriber, || run(&config, &env.fetcher)).unwrap();

        let output = logs.text();
        assert!(
            output
                .lines()
                .any(|line| line.contains("WARN") && line.contains("cheat_url_txt.template")),
            "no warning for the missing template in:\n{output}"
        );
        let missing: Vec<_> = report.missing_assets().collect();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].ends_with("cheat_url_txt.template"));
        assert!(!entry_names(&report.archive)
            .iter()
            .any(|name| name.ends_with("cheat_url_txt.template")));
    }

    #[test]
    fn second_run_is_byte_identical_and_clears_remnants() {
        let env = Env::new();
        env.local("cheat_url_txt.template", "template");
        let config = env.config();

        let first = run(&config, &env.fetcher).unwrap();
        let first_bytes = fs::read(&first.archive).unwrap();
        fs::write(first.workspace.join("config/breezehand/stale.txt"), "stale").unwrap();

        let second = run(&config, &env.fetcher).unwrap();

        assert!(!second.workspace.join("config/breezehand/stale.txt").exists());
        assert_eq!(fs::read(&second.archive).unwrap(), first_bytes);
        assert_eq!(first.files_packed, second.files_packed);
    }

    #[test]
    fn loader_fetch_failure_removes_scratch() {
        let env = Env::new();
        let config = env.config();

        let err = run(&config, &FailingFetcher).unwrap_err();

        assert!(matches!(err, PackageError::Network { .. }));
        assert!(env.scratch_is_empty());
        assert!(!config.archive_path().exists());
    }

    #[test]
    fn pinned_checksum_mismatch_aborts_and_removes_scratch() {
        let env = Env::new();
        let mut config = env.config();
        config.overlay.sha256 = Some("0".repeat(64));

        let err = run(&config, &env.fetcher).unwrap_err();

        assert!(matches!(err, PackageError::Integrity { .. }));
        assert!(env.scratch_is_empty());
    }

    #[test]
    fn overlay_archive_without_root_folder_is_archive_error() {
        let env = Env::new();
        let flat = env.program.join("flat.zip");
        write_zip(&flat, &[("README.md", "no folder")]);
        let mut fetcher = FixtureFetcher {
            files: env.fetcher.files.clone(),
        };
        fetcher.files.insert(OVERLAY_URL.to_string(), flat);
        let config = env.config();

        let err = run(&config, &fetcher).unwrap_err();

        assert!(matches!(err, PackageError::Archive { .. }));
        assert!(env.scratch_is_empty());
    }

    #[test]
    fn upstream_root_is_first_directory_by_name() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("overlay.zip");
        fs::create_dir_all(temp.path().join("b-repo")).unwrap();
        fs::create_dir_all(temp.path().join("a-repo")).unwrap();
        fs::write(temp.path().join("0-readme.md"), "file").unwrap();

        let root = locate_upstream_root(temp.path(), &archive).unwrap();

        assert_eq!(root, temp.path().join("a-repo"));
    }

    #[test]
    fn unreadable_extraction_dir_is_filesystem_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("overlay.zip");

        let err = locate_upstream_root(&temp.path().join("absent"), &archive).unwrap_err();

        assert!(matches!(err, PackageError::Filesystem { .. }));
    }
}
