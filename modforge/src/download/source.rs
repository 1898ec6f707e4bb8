//! The capability set every origin implements.

use std::path::{Path, PathBuf};

use crate::error::ModResult;
use crate::resolver::ModKind;

/// Origin-specific fetch and extraction.
///
/// One instance is bound to a descriptor during resolution and keeps track
/// of the artifact it last produced.
pub trait ModSource: std::fmt::Debug {
    /// Origin variant this source implements.
    fn kind(&self) -> ModKind;

    /// Verify the cached artifact. With `refresh`, a missing or stale
    /// artifact is fetched again and verified; without it the discrepancy is
    /// returned and the cache is not modified.
    fn check(&mut self, cache_dir: &Path, refresh: bool) -> ModResult<()>;

    /// Make the artifact available in `cache_dir` and return its path.
    ///
    /// With `use_cache`, an existing artifact matching the known hash is
    /// returned without fetching. `expected_hash` overrides any hash the
    /// source knows on its own.
    fn download(
        &mut self,
        cache_dir: &Path,
        use_cache: bool,
        expected_hash: Option<&str>,
    ) -> ModResult<PathBuf>;

    /// Materialize the artifact content into `dest`.
    fn extract(&self, dest: &Path) -> ModResult<()>;

    /// Artifact produced by the last `check` or `download`.
    fn archive(&self) -> Option<&Path>;
}
