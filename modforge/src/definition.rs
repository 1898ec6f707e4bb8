//! Catalog definition revision check.
//!
//! The catalog bundle ships a `version.txt` holding a single integer
//! revision. A newer revision published upstream is the only notion of
//! "update available"; there is no version solving.

use std::fs;
use std::path::Path;

use crate::download::HttpClient;
use crate::error::{ModError, ModResult};

/// Upstream location of the published definition revision.
pub const DEFAULT_REVISION_URL: &str =
    "https://raw.githubusercontent.com/Grokitach/Stalker_GAMMA/main/G.A.M.M.A_definition_version.txt";

/// Local revision file name inside the definition directory.
pub const VERSION_FILE: &str = "version.txt";

/// Local and upstream definition revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionStatus {
    /// `None` when no valid local revision exists.
    pub local: Option<u64>,
    pub remote: u64,
}

impl DefinitionStatus {
    pub fn is_outdated(&self) -> bool {
        self.local.map_or(true, |local| self.remote > local)
    }
}

/// Parse a revision text. Surrounding whitespace is ignored.
pub fn parse_revision(text: &str) -> Option<u64> {
    text.trim().parse().ok()
}

/// Read the local revision. A missing or unparsable file counts as none.
pub fn local_revision(path: &Path) -> ModResult<Option<u64>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|e| ModError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_revision(&text))
}

/// Compare the local revision file with the upstream revision at `url`.
pub fn check_definition(
    client: &dyn HttpClient,
    version_file: &Path,
    url: &str,
) -> ModResult<DefinitionStatus> {
    let local = local_revision(version_file)?;
    let text = client.get_text(url)?;
    let remote = parse_revision(&text).ok_or_else(|| ModError::MetadataIncomplete {
        url: url.to_string(),
        field: "revision",
    })?;

    let status = DefinitionStatus { local, remote };
    if status.is_outdated() {
        tracing::info!(local = ?local, remote, "Definition update available");
    } else {
        tracing::debug!(revision = remote, "Definition is up to date");
    }
    Ok(status)
}
