//! CLI error type.

use std::fmt;

use modforge::ModError;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or missing configuration.
    Config(String),
    /// Library failure that aborts the whole command.
    Library(ModError),
    /// The run completed but some mods failed.
    ModsFailed(usize),
}

impl CliError {
    /// Process exit code for the error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Library(_) | CliError::ModsFailed(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Library(e) => write!(f, "{}", e),
            CliError::ModsFailed(1) => write!(f, "1 mod failed"),
            CliError::ModsFailed(count) => write!(f, "{} mods failed", count),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Library(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ModError> for CliError {
    fn from(e: ModError) -> Self {
        match e {
            ModError::InvalidConfig(msg) => CliError::Config(msg),
            other => CliError::Library(other),
        }
    }
}
