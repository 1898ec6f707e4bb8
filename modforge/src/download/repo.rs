//! Source-hosting (GitHub) URL parsing.

use std::sync::OnceLock;

use regex::Regex;

/// Host serving source repositories and their archives.
pub const SOURCE_HOST: &str = "github.com";

fn repo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // (owner)/(project) followed by an optional archive reference:
        // /archive/main.zip, /archive/refs/heads/main.zip, /archive/refs/tags/v1.zip
        Regex::new(
            r"^https?://(?:www\.)?github\.com/([\w.-]+)/([\w.-]+?)(?:\.git)?(?:/archive/(?:refs/(?:heads|tags)/)?([\w.-]+?)\.zip)?(?:[/?#].*)?$",
        )
        .unwrap()
    })
}

/// A repository reference parsed from a source-hosting URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub project: String,
    /// Revision pinned by an archive link, if any.
    pub revision: Option<String>,
}

impl RepoRef {
    /// Parse a source-hosting URL. Returns `None` for other hosts.
    pub fn parse(url: &str) -> Option<Self> {
        let caps = repo_pattern().captures(url.trim())?;
        Some(Self {
            owner: caps[1].to_string(),
            project: caps[2].to_string(),
            revision: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }

    /// Canonical clone location of the repository.
    pub fn remote_url(&self) -> String {
        format!("https://{}/{}/{}", SOURCE_HOST, self.owner, self.project)
    }
}

/// Whether a URL points at the source-hosting site.
pub fn is_source_host(url: &str) -> bool {
    reqwest::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.") == SOURCE_HOST))
        .unwrap_or(false)
}

/// Whether a source-hosting URL is a direct package link rather than a
/// repository page.
pub fn is_direct_archive(url: &str) -> bool {
    url.contains("/archive/") || url.contains("/releases/") || url.ends_with(".zip")
}
