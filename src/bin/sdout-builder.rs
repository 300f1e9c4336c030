use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use sdout_builder::{pipeline, BuildReport, HttpFetcher, PackageConfig};
use tracing_subscriber::EnvFilter;

/// Assemble the SD card package: download upstream archives, merge local
/// overrides, and zip the result.
#[derive(Debug, Parser)]
#[command(name = "sdout-builder", version)]
struct Cli {
    /// Directory holding local overrides and static assets [default: current dir]
    #[arg(long)]
    program_dir: Option<PathBuf>,

    /// Directory receiving the package folder and archive [default: program dir]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Package name; names the folder, the archive and the config area
    #[arg(long)]
    name: Option<String>,

    /// Configuration file [default: <program dir>/sdout.toml when present]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parent directory for the temporary download area
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Log every copied file
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match build(cli) {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("\n[ERROR] Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn build(cli: Cli) -> Result<BuildReport> {
    let program_dir = match cli.program_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("resolving current directory")?,
    };

    let mut config = PackageConfig::load(&program_dir, cli.config.as_deref())
        .context("loading package configuration")?;
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(name) = cli.name {
        config.name = name;
    }
    if cli.scratch_dir.is_some() {
        config.scratch_parent = cli.scratch_dir;
    }
    config
        .validate(cli.config.as_deref().unwrap_or(&program_dir))
        .context("validating package configuration")?;

    let fetcher = HttpFetcher::new()?;
    pipeline::run(&config, &fetcher)
        .with_context(|| format!("building package '{}'", config.name))
}

fn print_summary(report: &BuildReport) {
    for merge in &report.merges {
        println!(
            "  {:<10} {} upstream, {} local",
            merge.category, merge.upstream, merge.local
        );
    }
    for missing in report.missing_assets() {
        println!("  warning: {} was not packaged", missing.display());
    }
    let name = report
        .archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    println!("[DONE] Successfully created {name} ({} files)", report.files_packed);
    println!("Location: {}", report.archive.display());
}
