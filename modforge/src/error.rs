//! Error types for the install pipeline.

use std::io;
use std::path::PathBuf;

/// Result type for pipeline operations.
pub type ModResult<T> = Result<T, ModError>;

/// Errors that can occur while resolving, fetching or installing a mod.
#[derive(Debug)]
pub enum ModError {
    /// Failed to read a file or directory.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Connection-level failure. The only retryable error.
    Network { url: String, reason: String },

    /// Request failed for a reason other than connectivity.
    RequestFailed { url: String, reason: String },

    /// Server answered with a non-success status.
    HttpStatus { url: String, status: u16 },

    /// Cached or freshly downloaded archive does not match its checksum.
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// Archive is absent from the cache and refreshing was not allowed.
    NotCached { filename: String },

    /// Failed to fetch the landing page carrying archive metadata.
    MetadataFetch { url: String, reason: String },

    /// Landing page is missing a field required for verification.
    MetadataIncomplete { url: String, field: &'static str },

    /// Landing page download link disagrees with the catalog URL.
    MetadataInconsistent {
        filename: String,
        url: String,
        declared: String,
    },

    /// No mirror link could be found on the gallery download page.
    MirrorNotFound { url: String },

    /// File does not start with a known archive signature.
    UnknownArchive { path: PathBuf },

    /// Archive extraction or listing failed.
    ExtractionFailed { path: PathBuf, reason: String },

    /// `fomod/ModuleConfig.xml` is not well-formed XML.
    InvalidModuleConfig { path: PathBuf, reason: String },

    /// A git command failed.
    GitFailed { repository: String, reason: String },

    /// No install source was found for a mod inside its fetched content.
    SourceNotFound { name: String },

    /// The URL cannot be handled by the selected downloader.
    InvalidUrl(String),

    /// Invalid configuration.
    InvalidConfig(String),

    /// The downloader has not produced an archive yet.
    ArchiveUnavailable { name: String },
}

impl ModError {
    /// Whether the failure may go away by trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl std::fmt::Display for ModError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::Network { url, reason } => {
                write!(f, "connection error for {}: {}", url, reason)
            }
            Self::RequestFailed { url, reason } => {
                write!(f, "request to {} failed: {}", url, reason)
            }
            Self::HttpStatus { url, status } => {
                write!(f, "request to {} failed with status {}", url, status)
            }
            Self::ChecksumMismatch {
                filename,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "checksum mismatch for {}: expected {}, got {}",
                    filename, expected, actual
                )
            }
            Self::NotCached { filename } => {
                write!(f, "hash verification failed since {} does not exist", filename)
            }
            Self::MetadataFetch { url, reason } => {
                write!(f, "failed to fetch metadata from {}: {}", url, reason)
            }
            Self::MetadataIncomplete { url, field } => {
                write!(f, "could not find {} in {}", field, url)
            }
            Self::MetadataInconsistent {
                filename,
                url,
                declared,
            } => {
                write!(
                    f,
                    "skipping {} since landing page download link {} does not match {}",
                    filename, declared, url
                )
            }
            Self::MirrorNotFound { url } => {
                write!(f, "download link not found when requesting {}", url)
            }
            Self::UnknownArchive { path } => {
                write!(
                    f,
                    "{} is an unknown file type, download probably failed",
                    path.display()
                )
            }
            Self::ExtractionFailed { path, reason } => {
                write!(f, "failed to extract {}: {}", path.display(), reason)
            }
            Self::InvalidModuleConfig { path, reason } => {
                write!(f, "invalid FOMOD config {}: {}", path.display(), reason)
            }
            Self::GitFailed { repository, reason } => {
                write!(f, "git operation on {} failed: {}", repository, reason)
            }
            Self::SourceNotFound { name } => {
                write!(f, "no install directory found for {}", name)
            }
            Self::InvalidUrl(msg) => write!(f, "invalid URL: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::ArchiveUnavailable { name } => {
                write!(
                    f,
                    "archive of {} not available, run check() or download() first",
                    name
                )
            }
        }
    }
}

impl std::error::Error for ModError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::CreateDirFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
