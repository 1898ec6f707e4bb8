//! Fetching mod content from its origin.
//!
//! Every origin implements [`ModSource`]:
//!
//! ```text
//! ModSource (trait)
//!     ├── DefaultSource     plain HTTP archive
//!     ├── GallerySource     landing page + mirror redirect
//!     ├── GitSource         bare clone + worktree checkout
//!     └── SeparatorSource   no content
//! ```
//!
//! The HTTP sources share a [`Transfer`] (client handle, retry policy,
//! progress sink) which streams into the cache while hashing. The client is
//! constructed once per run and passed down through [`SourceContext`].

mod default;
pub mod gallery;
mod git;
mod http;
pub mod repo;
mod retry;
mod separator;
mod source;
mod transfer;

pub use default::{archive_filename, DefaultSource};
pub use gallery::{GalleryMetadata, GallerySource};
pub use git::GitSource;
pub use http::{HttpBody, HttpClient, ReqwestClient};
pub use repo::RepoRef;
pub use retry::RetryPolicy;
pub use separator::SeparatorSource;
pub use source::ModSource;
pub use transfer::Transfer;

#[cfg(test)]
pub(crate) use http::fake;

use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::ArchiveExtractor;
use crate::config::PipelineConfig;
use crate::error::{ModError, ModResult};
use crate::hash::ProgressCallback;
use crate::resolver::{ModDescriptor, ModKind};

/// Everything a source needs besides its descriptor.
#[derive(Clone)]
pub struct SourceContext {
    pub client: Arc<dyn HttpClient>,
    pub retry: RetryPolicy,
    pub extractor: ArchiveExtractor,
    pub git_binary: PathBuf,
    pub gallery_base_url: String,
    pub progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for SourceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceContext")
            .field("retry", &self.retry)
            .field("extractor", &self.extractor)
            .field("git_binary", &self.git_binary)
            .field("gallery_base_url", &self.gallery_base_url)
            .finish_non_exhaustive()
    }
}

impl SourceContext {
    pub fn from_config(config: &PipelineConfig, client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::from_config(config),
            extractor: ArchiveExtractor::new(config.seven_zip_binary.clone()),
            git_binary: config.git_binary.clone(),
            gallery_base_url: config.gallery_base_url.clone(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    fn transfer(&self) -> Transfer {
        let transfer = Transfer::new(self.client.clone(), self.retry);
        match &self.progress {
            Some(progress) => transfer.with_progress(progress.clone()),
            None => transfer,
        }
    }
}

/// Bind the source matching a descriptor's kind.
///
/// Returns `None` for a non-separator descriptor without a URL, which has
/// nothing to fetch.
pub fn bind_source(
    descriptor: &ModDescriptor,
    ctx: &SourceContext,
) -> ModResult<Option<Box<dyn ModSource>>> {
    let source: Box<dyn ModSource> = match descriptor.kind {
        ModKind::Separator => Box::new(SeparatorSource),
        ModKind::GitResource => {
            let location = descriptor
                .repository
                .as_deref()
                .unwrap_or(&descriptor.content_url);
            Box::new(GitSource::from_url(location, ctx.git_binary.clone())?)
        }
        ModKind::GalleryHosted => Box::new(GallerySource::new(
            &descriptor.name,
            &descriptor.content_url,
            &descriptor.info_url,
            &ctx.gallery_base_url,
            ctx.transfer(),
            ctx.extractor.clone(),
        )),
        ModKind::Default => {
            if descriptor.content_url.trim().is_empty() {
                return Ok(None);
            }
            Box::new(
                DefaultSource::new(
                    &descriptor.name,
                    descriptor.content_url.trim(),
                    ctx.transfer(),
                    ctx.extractor.clone(),
                )
                .with_filename(descriptor.filename_override.clone())
                .with_hash(descriptor.hash_override.clone()),
            )
        }
    };

    Ok(Some(source))
}

/// Select a source from a bare URL.
///
/// - gallery host: [`GallerySource`] (without an info page)
/// - source host, direct archive link: [`DefaultSource`]
/// - source host, anything else: [`GitSource`]
/// - empty: `None`
/// - anything else: [`DefaultSource`]
pub fn source_for_url(url: &str, ctx: &SourceContext) -> ModResult<Option<Box<dyn ModSource>>> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(None);
    }

    if url.contains(char::is_whitespace) {
        return Err(ModError::InvalidUrl(url.to_string()));
    }

    let source: Box<dyn ModSource> = if gallery::is_gallery_host(url) {
        Box::new(GallerySource::new(
            url,
            url,
            "",
            &ctx.gallery_base_url,
            ctx.transfer(),
            ctx.extractor.clone(),
        ))
    } else if repo::is_source_host(url) && !repo::is_direct_archive(url) {
        Box::new(GitSource::from_url(url, ctx.git_binary.clone())?)
    } else {
        Box::new(DefaultSource::new(url, url, ctx.transfer(), ctx.extractor.clone()))
    };

    Ok(Some(source))
}
