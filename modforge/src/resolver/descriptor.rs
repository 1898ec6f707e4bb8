//! Resolved mod descriptors and their classification.

use std::fmt;
use std::path::PathBuf;

use crate::catalog::CatalogRecord;
use crate::download::gallery::is_gallery_host;
use crate::download::repo::{is_direct_archive, is_source_host, RepoRef};

/// Gallery link used by the catalog for content actually served from a
/// source repository named in the info URL.
pub const GALLERY_PLACEHOLDER: &str = "addons/start/222467";

/// Manifest keys containing this marker are separators.
pub const SEPARATOR_MARKER: &str = "separator";

/// How a descriptor is fetched and installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModKind {
    /// Direct HTTP archive.
    Default,
    /// Landing page on the gallery site requiring mirror resolution.
    GalleryHosted,
    /// Repository fetched once and shared by several install targets.
    GitResource,
    /// Visual group marker, never downloaded.
    Separator,
}

impl ModKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::GalleryHosted => "GalleryHosted",
            Self::GitResource => "GitResource",
            Self::Separator => "Separator",
        }
    }
}

impl fmt::Display for ModKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of the resolved manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModDescriptor {
    /// Manifest key. Unique within a resolution.
    pub name: String,
    /// Manifest `+`/`-` flag.
    pub enabled: bool,
    pub title: String,
    pub author: String,
    pub content_url: String,
    pub info_url: String,
    /// Relative directories to install from, empty for the archive root.
    pub subdirs: Vec<PathBuf>,
    pub kind: ModKind,
    pub filename_override: Option<String>,
    pub hash_override: Option<String>,
    /// Repository location shared by a [`ModKind::GitResource`] group.
    pub repository: Option<String>,
}

impl ModDescriptor {
    /// Build a descriptor from a bound catalog record.
    pub fn from_record(name: &str, enabled: bool, record: &CatalogRecord) -> Self {
        let (kind, repository) = classify(record);

        Self {
            name: name.to_string(),
            enabled,
            title: record.title.clone(),
            author: record.author.clone(),
            content_url: record.content_url.clone(),
            info_url: record.info_url.clone(),
            subdirs: record.subdirs.clone(),
            kind,
            filename_override: record.filename_override().map(str::to_string),
            hash_override: record.hash_override().map(str::to_string),
            repository,
        }
    }

    /// Build a separator descriptor. Separators carry no URL.
    pub fn separator(name: &str, enabled: bool) -> Self {
        Self {
            name: name.to_string(),
            enabled,
            title: String::new(),
            author: String::new(),
            content_url: String::new(),
            info_url: String::new(),
            subdirs: Vec::new(),
            kind: ModKind::Separator,
            filename_override: None,
            hash_override: None,
            repository: None,
        }
    }

    pub fn is_separator(&self) -> bool {
        self.kind == ModKind::Separator
    }

    /// URL recorded as provenance: the info page when present.
    pub fn provenance_url(&self) -> &str {
        if self.info_url.is_empty() {
            &self.content_url
        } else {
            &self.info_url
        }
    }
}

/// Whether a manifest key names a separator.
pub fn is_separator_key(key: &str) -> bool {
    key.contains(SEPARATOR_MARKER)
}

/// Classify a catalog record, returning the repository location for
/// repository-backed records.
pub fn classify(record: &CatalogRecord) -> (ModKind, Option<String>) {
    if record.content_url.contains(GALLERY_PLACEHOLDER) && is_source_host(&record.info_url) {
        return (ModKind::GitResource, Some(repository_location(&record.info_url)));
    }

    if is_gallery_host(&record.content_url) {
        return (ModKind::GalleryHosted, None);
    }

    if is_source_host(&record.content_url) && !is_direct_archive(&record.content_url) {
        return (
            ModKind::GitResource,
            Some(repository_location(&record.content_url)),
        );
    }

    (ModKind::Default, None)
}

fn repository_location(url: &str) -> String {
    RepoRef::parse(url)
        .map(|r| r.remote_url())
        .unwrap_or_else(|| url.trim().trim_end_matches('/').to_string())
}
