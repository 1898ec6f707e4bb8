//! Diagnostics and the per-run report handed back to the caller.

use std::fmt;
use std::path::PathBuf;

use crate::catalog::ParseError;

/// Non-fatal finding. Never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Catalog line skipped by the parser.
    SkippedLine(ParseError),
    /// Catalog record no manifest entry claimed.
    UnboundRecord { name: String },
    /// Manifest entry without a catalog record.
    UnmatchedEntry { name: String },
    /// Declared subdirectory absent after extraction.
    MissingDirective { mod_name: String, directory: PathBuf },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SkippedLine(e) => write!(f, "Skipping catalog {}", e),
            Diagnostic::UnboundRecord { name } => {
                write!(f, "No mod folder found for {}", name)
            }
            Diagnostic::UnmatchedEntry { name } => {
                write!(f, "No catalog record found for {}", name)
            }
            Diagnostic::MissingDirective {
                mod_name,
                directory,
            } => {
                write!(
                    f,
                    "{}: directory {} does not exist",
                    mod_name,
                    directory.display()
                )
            }
        }
    }
}

/// Lifecycle of one descriptor through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModState {
    Unresolved,
    Bound,
    Downloaded,
    Extracted,
    Normalized,
    Materialized,
    /// Verified by the check workflow without installing.
    Verified,
    Failed,
}

impl ModState {
    /// Get a human-readable name for the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unresolved => "Unresolved",
            Self::Bound => "Bound",
            Self::Downloaded => "Downloaded",
            Self::Extracted => "Extracted",
            Self::Normalized => "Normalized",
            Self::Materialized => "Materialized",
            Self::Verified => "Verified",
            Self::Failed => "Failed",
        }
    }

    /// Whether the state ends the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Materialized | Self::Verified | Self::Failed)
    }
}

/// Final state of one mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModOutcome {
    pub name: String,
    pub state: ModState,
}

/// Result of a pipeline run.
///
/// An empty `errors` list is the only success signal.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Final state per mod, in manifest order.
    pub outcomes: Vec<ModOutcome>,
    /// Per-mod error strings.
    pub errors: Vec<String>,
    /// Non-fatal diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl PipelineReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no error was accumulated.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn record(&mut self, name: impl Into<String>, state: ModState) {
        self.outcomes.push(ModOutcome {
            name: name.into(),
            state,
        });
    }

    pub fn fail(&mut self, name: impl Into<String>, error: impl fmt::Display) {
        let name = name.into();
        tracing::error!(mod_name = %name, error = %error, "Mod failed");
        self.errors.push(format!("{}: {}", name, error));
        self.record(name, ModState::Failed);
    }

    pub fn warn(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    /// Names of mods that ended in the given state.
    pub fn with_state(&self, state: ModState) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.state == state)
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Every error and diagnostic as a printable line.
    pub fn summary_lines(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("Error: {}", e))
            .chain(self.diagnostics.iter().map(|d| format!("Warning: {}", d)))
            .collect()
    }
}
