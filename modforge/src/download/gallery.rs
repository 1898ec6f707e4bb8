//! Gallery-hosted (ModDB) archives.
//!
//! The catalog URL of a gallery record is a landing page, not a file. Getting
//! the archive takes three requests:
//!
//! 1. the info page, for the published file name, MD5 and "download" link
//! 2. the content page, for a `/downloads/mirror/{id}/...` path
//! 3. the mirror path without following redirects, whose `Location` header is
//!    the real file URL
//!
//! A record whose info page declares a download link that is not part of the
//! catalog URL is rejected before anything is transferred.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::source::ModSource;
use super::transfer::Transfer;
use crate::archive::ArchiveExtractor;
use crate::error::{ModError, ModResult};
use crate::resolver::ModKind;

/// Host of the gallery site.
pub const GALLERY_HOST: &str = "moddb.com";

const FILENAME_FIELD: &str = "Filename";
const HASH_FIELD: &str = "MD5 Hash";

/// Whether a URL points at the gallery site.
pub fn is_gallery_host(url: &str) -> bool {
    reqwest::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h == GALLERY_HOST || h.ends_with(".moddb.com")))
        .unwrap_or(false)
}

fn row_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"<div[^>]*\bclass="row clear"[^>]*>"#).unwrap())
}

fn field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<h5[^>]*>(.*?)</h5>.*?<span[^>]*>(.*?)</span>").unwrap()
    })
}

fn toggle_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"<a\b[^>]*\bid="downloadmirrorstoggle"[^>]*>"#).unwrap())
}

fn href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"\bhref="([^"]*)""#).unwrap())
}

fn mirror_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"/downloads/mirror/([^/"]+)/[^"]*"#).unwrap())
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

/// Metadata published on a gallery info page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryMetadata {
    pub filename: Option<String>,
    pub md5: Option<String>,
    /// Target of the "download" anchor.
    pub download: Option<String>,
}

impl GalleryMetadata {
    /// Extract the metadata rows and the download anchor from page HTML.
    pub fn parse(html: &str) -> Self {
        let mut metadata = Self::default();

        let starts: Vec<usize> = row_pattern().find_iter(html).map(|m| m.end()).collect();
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(html.len());
            let row = &html[start..end];

            let Some(caps) = field_pattern().captures(row) else {
                continue;
            };
            let name = text_of(&caps[1]);
            let value = text_of(&caps[2]);

            match name.as_str() {
                FILENAME_FIELD if metadata.filename.is_none() => metadata.filename = Some(value),
                HASH_FIELD if metadata.md5.is_none() => metadata.md5 = Some(value),
                _ => {}
            }
        }

        metadata.download = toggle_pattern()
            .find(html)
            .and_then(|tag| href_pattern().captures(tag.as_str()))
            .map(|caps| unescape(caps[1].trim()));

        metadata
    }

    /// Whether the declared download link is part of `url`. A page without
    /// a download link declares nothing and is accepted.
    pub fn matches_url(&self, url: &str) -> bool {
        match self.download.as_deref() {
            Some(declared) => url.contains(declared),
            None => true,
        }
    }
}

fn text_of(fragment: &str) -> String {
    unescape(tag_pattern().replace_all(fragment, "").trim())
}

fn unescape(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Find the mirror path for a content URL in its page HTML.
pub fn find_mirror_path(content_url: &str, html: &str) -> Option<String> {
    let id = content_url.trim_end_matches('/').rsplit('/').next()?;
    if id.is_empty() {
        return None;
    }
    mirror_pattern()
        .captures_iter(html)
        .find(|caps| &caps[1] == id)
        .map(|caps| caps[0].to_string())
}

/// Gallery-hosted archive source.
#[derive(Debug)]
pub struct GallerySource {
    name: String,
    url: String,
    info_url: String,
    base_url: String,
    transfer: Transfer,
    extractor: ArchiveExtractor,
    metadata: Option<GalleryMetadata>,
    archive: Option<PathBuf>,
}

impl GallerySource {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        info_url: impl Into<String>,
        base_url: impl Into<String>,
        transfer: Transfer,
        extractor: ArchiveExtractor,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            info_url: info_url.into(),
            base_url: base_url.into(),
            transfer,
            extractor,
            metadata: None,
            archive: None,
        }
    }

    /// Fetch and cache the info page metadata.
    pub fn metadata(&mut self) -> ModResult<&GalleryMetadata> {
        if self.metadata.is_none() {
            let metadata = if self.info_url.is_empty() {
                GalleryMetadata::default()
            } else {
                let html = self.transfer.client().get_text(&self.info_url).map_err(|e| {
                    ModError::MetadataFetch {
                        url: self.info_url.clone(),
                        reason: e.to_string(),
                    }
                })?;
                GalleryMetadata::parse(&html)
            };
            tracing::debug!(mod_name = %self.name, ?metadata, "Gallery metadata");
            self.metadata = Some(metadata);
        }

        self.metadata
            .as_ref()
            .ok_or_else(|| ModError::ArchiveUnavailable {
                name: self.name.clone(),
            })
    }

    /// Reject the record when the info page disagrees with the catalog URL.
    fn ensure_consistent(&mut self) -> ModResult<GalleryMetadata> {
        let url = self.url.clone();
        let metadata = self.metadata()?.clone();

        if !metadata.matches_url(&url) {
            return Err(ModError::MetadataInconsistent {
                filename: metadata.filename.unwrap_or_else(|| self.name.clone()),
                url,
                declared: metadata.download.unwrap_or_default(),
            });
        }

        Ok(metadata)
    }

    /// Resolve the content URL to the real file location.
    pub fn resolve_mirror(&self) -> ModResult<String> {
        resolve_mirror(&self.transfer, &self.url, &self.base_url)
    }
}

fn resolve_mirror(transfer: &Transfer, url: &str, base_url: &str) -> ModResult<String> {
    let html = transfer.client().get_text(url)?;
    let path = find_mirror_path(url, &html).ok_or_else(|| ModError::MirrorNotFound {
        url: url.to_string(),
    })?;

    let mirror = format!("{}{}", base_url.trim_end_matches('/'), path);
    let location = transfer
        .client()
        .redirect_location(&mirror)?
        .ok_or_else(|| ModError::MirrorNotFound {
            url: mirror.clone(),
        })?;

    tracing::debug!(url = %url, location = %location, "Resolved gallery mirror");
    Ok(location)
}

fn basename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

impl ModSource for GallerySource {
    fn kind(&self) -> ModKind {
        ModKind::GalleryHosted
    }

    fn check(&mut self, cache_dir: &Path, refresh: bool) -> ModResult<()> {
        if self.info_url.is_empty() {
            return Err(ModError::MetadataIncomplete {
                url: self.url.clone(),
                field: "info URL",
            });
        }

        let metadata = self.ensure_consistent()?;
        let filename = metadata.filename.ok_or_else(|| ModError::MetadataIncomplete {
            url: self.info_url.clone(),
            field: FILENAME_FIELD,
        })?;
        let md5 = metadata.md5.ok_or_else(|| ModError::MetadataIncomplete {
            url: self.info_url.clone(),
            field: HASH_FIELD,
        })?;

        let path = cache_dir.join(&filename);
        let (transfer, url, base) = (&self.transfer, &self.url, &self.base_url);
        transfer.check_cached(&path, Some(&md5), refresh, || {
            resolve_mirror(transfer, url, base)
        })?;

        self.archive = Some(path);
        Ok(())
    }

    fn download(
        &mut self,
        cache_dir: &Path,
        use_cache: bool,
        expected_hash: Option<&str>,
    ) -> ModResult<PathBuf> {
        let metadata = self.ensure_consistent()?;
        let hash = expected_hash.map(str::to_string).or(metadata.md5);

        // Without a published file name the mirror has to be resolved first
        // to learn it.
        let (path, resolved) = match metadata.filename {
            Some(filename) => (cache_dir.join(filename), None),
            None => {
                let location = self.resolve_mirror()?;
                let filename = basename(&location).ok_or_else(|| {
                    ModError::InvalidUrl(format!("no file name in {}", location))
                })?;
                (cache_dir.join(filename), Some(location))
            }
        };

        let (transfer, url, base) = (&self.transfer, &self.url, &self.base_url);
        transfer.download_cached(&path, hash.as_deref(), use_cache, || match resolved {
            Some(location) => Ok(location),
            None => resolve_mirror(transfer, url, base),
        })?;

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
