//! Modforge CLI - Command-line interface
//!
//! Resolves a modpack definition and installs it into a Mod Organizer
//! `mods` directory.

mod commands;
mod error;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CheckArgs, InstallArgs, ListArgs, UpdateCheckArgs};

#[derive(Parser)]
#[command(name = "modforge", version, about = "Resolve, download and install a modpack")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// INI configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and install every mod of the manifest
    Install(InstallArgs),
    /// Verify cached archives without installing
    Check(CheckArgs),
    /// Show how the manifest resolves
    List(ListArgs),
    /// Compare the local definition revision with upstream
    UpdateCheck(UpdateCheckArgs),
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Install(args) => commands::install(args, cli.config.as_deref()),
        Commands::Check(args) => commands::check(args, cli.config.as_deref()),
        Commands::List(args) => commands::list(args),
        Commands::UpdateCheck(args) => commands::update_check(args, cli.config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
