use std::path::{Path, PathBuf};

use super::source::ModSource;
use crate::error::ModResult;
use crate::resolver::ModKind;

/// Source of a separator. Never touches the network or the cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeparatorSource;

impl ModSource for SeparatorSource {
    fn kind(&self) -> ModKind {
        ModKind::Separator
    }

    fn check(&mut self, _cache_dir: &Path, _refresh: bool) -> ModResult<()> {
        Ok(())
    }

    fn download(
        &mut self,
        _cache_dir: &Path,
        _use_cache: bool,
        _expected_hash: Option<&str>,
    ) -> ModResult<PathBuf> {
        Ok(PathBuf::new())
    }

    fn extract(&self, _dest: &Path) -> ModResult<()> {
        Ok(())
    }

    fn archive(&self) -> Option<&Path> {
        None
    }
}
