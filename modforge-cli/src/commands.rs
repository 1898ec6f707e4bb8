//! Subcommand implementations.

use std::path::{Path, PathBuf};

use clap::Args;
use modforge::catalog::Catalogs;
use modforge::definition::{self, DEFAULT_REVISION_URL};
use modforge::download::ReqwestClient;
use modforge::resolver::{self, Resolution};
use modforge::{Pipeline, PipelineConfig, PipelineReport};

use crate::error::CliError;
use crate::progress::PipelineProgress;

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Directory holding modlist.txt and modpack_maker_list.txt
    #[arg(long, value_name = "DIR")]
    pub definition: PathBuf,

    /// Mod Organizer mods directory
    #[arg(long, value_name = "DIR")]
    pub mods: Option<PathBuf>,

    /// Archive cache directory
    #[arg(long, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    /// Download every archive again, even when a valid copy is cached
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Directory holding modlist.txt and modpack_maker_list.txt
    #[arg(long, value_name = "DIR")]
    pub definition: PathBuf,

    /// Archive cache directory
    #[arg(long, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    /// Fetch missing or stale archives instead of reporting them
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Directory holding modlist.txt and modpack_maker_list.txt
    #[arg(long, value_name = "DIR")]
    pub definition: PathBuf,

    /// Only show enabled mods
    #[arg(long)]
    pub enabled: bool,
}

#[derive(Debug, Args)]
pub struct UpdateCheckArgs {
    /// Local revision file
    #[arg(long, value_name = "FILE")]
    pub version_file: PathBuf,

    /// Upstream revision URL
    #[arg(long, default_value = DEFAULT_REVISION_URL)]
    pub url: String,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_resolution(definition: &Path) -> Result<Resolution, CliError> {
    let catalogs = Catalogs::load_dir(definition)?;
    Ok(resolver::resolve(&catalogs))
}

fn finish(report: &PipelineReport) -> Result<(), CliError> {
    for line in report.summary_lines() {
        println!("{}", line);
    }
    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::ModsFailed(report.errors.len()))
    }
}

pub fn install(args: InstallArgs, config: Option<&Path>) -> Result<(), CliError> {
    let mut config = load_config(config)?;
    if let Some(mods) = args.mods {
        config = config.with_mods_dir(mods);
    }
    if let Some(cache) = args.cache {
        config = config.with_cache_dir(cache);
    }

    tracing::info!(
        definition = %args.definition.display(),
        mods = %config.mods_dir.display(),
        cache = %config.cache_dir.display(),
        "Starting install"
    );
    let resolution = load_resolution(&args.definition)?;
    let progress = PipelineProgress::new();
    let pipeline = Pipeline::from_config(&config)?
        .with_use_cache(!args.no_cache)
        .with_progress(progress.bytes())
        .with_state_callback(progress.states());

    let report = pipeline.install(&resolution);
    progress.finish();

    println!(
        "Installed {} of {} mods into {}",
        report.with_state(modforge::ModState::Materialized).len(),
        resolution.descriptors.len(),
        config.mods_dir.display()
    );
    finish(&report)
}

pub fn check(args: CheckArgs, config: Option<&Path>) -> Result<(), CliError> {
    let mut config = load_config(config)?;
    if let Some(cache) = args.cache {
        config = config.with_cache_dir(cache);
    }

    let resolution = load_resolution(&args.definition)?;
    let progress = PipelineProgress::new();
    let pipeline = Pipeline::from_config(&config)?
        .with_progress(progress.bytes())
        .with_state_callback(progress.states());

    let report = pipeline.check(&resolution, args.refresh);
    progress.finish();

    println!(
        "Verified {} of {} mods",
        report.with_state(modforge::ModState::Verified).len(),
        resolution.descriptors.len()
    );
    finish(&report)
}

pub fn list(args: ListArgs) -> Result<(), CliError> {
    let resolution = load_resolution(&args.definition)?;

    for descriptor in &resolution.descriptors {
        if args.enabled && !descriptor.enabled {
            continue;
        }
        let flag = if descriptor.enabled { '+' } else { '-' };
        println!("{} {:<13} {}", flag, descriptor.kind.name(), descriptor.name);
    }
    for diagnostic in &resolution.diagnostics {
        println!("Warning: {}", diagnostic);
    }
    Ok(())
}

pub fn update_check(args: UpdateCheckArgs, config: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config)?;
    let client = ReqwestClient::from_config(&config)?;
    let status = definition::check_definition(&client, &args.version_file, &args.url)?;

    match (status.local, status.is_outdated()) {
        (Some(local), true) => println!("Definition {} -> {} available", local, status.remote),
        (None, _) => println!("No local definition, revision {} available", status.remote),
        (Some(local), false) => println!("Definition {} is up to date", local),
    }
    Ok(())
}
