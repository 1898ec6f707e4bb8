//! Plain HTTP archives.

use std::path::{Path, PathBuf};

use super::repo::{is_source_host, RepoRef};
use super::source::ModSource;
use super::transfer::Transfer;
use crate::archive::ArchiveExtractor;
use crate::error::{ModError, ModResult};
use crate::resolver::ModKind;

/// Cache file name for an archive URL.
///
/// An explicit name wins. Source-hosting archive links are prefixed with the
/// project name (`main.zip` would collide across repositories); every other
/// URL uses its last path segment.
pub fn archive_filename(url: &str, explicit: Option<&str>) -> ModResult<String> {
    if let Some(name) = explicit.filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }

    let parsed =
        reqwest::Url::parse(url.trim()).map_err(|e| ModError::InvalidUrl(format!("{}: {}", url, e)))?;
    let basename = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .ok_or_else(|| ModError::InvalidUrl(format!("no file name in {}", url)))?;

    if is_source_host(url) {
        if let Some(repo) = RepoRef::parse(url) {
            return Ok(format!("{}-{}", repo.project, basename));
        }
    }

    Ok(basename.to_string())
}

/// Archive downloaded straight from its URL.
#[derive(Debug)]
pub struct DefaultSource {
    name: String,
    url: String,
    filename: Option<String>,
    hash: Option<String>,
    transfer: Transfer,
    extractor: ArchiveExtractor,
    archive: Option<PathBuf>,
}

impl DefaultSource {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        transfer: Transfer,
        extractor: ArchiveExtractor,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            filename: None,
            hash: None,
            transfer,
            extractor,
            archive: None,
        }
    }

    /// Force the cache file name.
    pub fn with_filename(mut self, filename: Option<String>) -> Self {
        self.filename = filename;
        self
    }

    /// Known archive checksum.
    pub fn with_hash(mut self, hash: Option<String>) -> Self {
        self.hash = hash;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn cache_path(&self, cache_dir: &Path) -> ModResult<PathBuf> {
        Ok(cache_dir.join(archive_filename(&self.url, self.filename.as_deref())?))
    }
}

impl ModSource for DefaultSource {
    fn kind(&self) -> ModKind {
        ModKind::Default
    }

    fn check(&mut self, cache_dir: &Path, refresh: bool) -> ModResult<()> {
        let path = self.cache_path(cache_dir)?;
        let url = self.url.clone();
        self.transfer
            .check_cached(&path, self.hash.as_deref(), refresh, || Ok(url))?;
        self.archive = Some(path);
        Ok(())
    }

    fn download(
        &mut self,
        cache_dir: &Path,
        use_cache: bool,
        expected_hash: Option<&str>,
    ) -> ModResult<PathBuf> {
        let path = self.cache_path(cache_dir)?;
        let hash = expected_hash.or(self.hash.as_deref());
        let url = self.url.clone();
        self.transfer
            .download_cached(&path, hash, use_cache, || Ok(url))?;

        tracing::debug!(mod_name = %self.name, archive = %path.display(), "Archive ready");
        self.archive = Some(path.clone());
        Ok(path)
    }

    fn extract(&self, dest: &Path) -> ModResult<()> {
        let archive = self.archive().ok_or_else(|| ModError::ArchiveUnavailable {
            name: self.name.clone(),
        })?;
        self.extractor.extract(archive, dest, None).map(|_| ())
    }

    fn archive(&self) -> Option<&Path> {
        self.archive.as_deref()
    }
}
