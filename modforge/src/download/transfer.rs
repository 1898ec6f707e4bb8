//! Streamed, hash-verified transfers into the archive cache.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use super::http::HttpClient;
use super::retry::RetryPolicy;
use crate::error::{ModError, ModResult};
use crate::fsutil::create_dir_all;
use crate::hash::{check_hash, ProgressCallback, StreamingHasher, BLOCK_SIZE};

/// HTTP client, retry policy and progress sink shared by the HTTP sources.
#[derive(Clone)]
pub struct Transfer {
    client: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("retry", &self.retry)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl Transfer {
    pub fn new(client: Arc<dyn HttpClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            progress: None,
        }
    }

    /// Report `(bytes_done, bytes_total)` while downloading and hashing.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn client(&self) -> &dyn HttpClient {
        self.client.as_ref()
    }

    /// Download `url` into `dest` and return the MD5 of the received bytes.
    ///
    /// Connection failures are retried per the policy. A partial file is
    /// deleted before every retry and when the transfer finally fails.
    pub fn fetch(&self, url: &str, dest: &Path) -> ModResult<String> {
        if let Some(parent) = dest.parent() {
            create_dir_all(parent)?;
        }

        tracing::info!(url = %url, file = %dest.display(), "Downloading");

        let result = self.retry.run(url, |attempt| {
            remove_partial(dest);
            if attempt > 1 {
                tracing::debug!(url = %url, attempt, "Retrying download");
            }
            self.fetch_once(url, dest)
        });

        if result.is_err() {
            remove_partial(dest);
        }
        result
    }

    fn fetch_once(&self, url: &str, dest: &Path) -> ModResult<String> {
        let mut body = self.client.get(url)?;
        let total = body.content_length.unwrap_or(0);

        let write_failed = |e| ModError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        };

        let file = File::create(dest).map_err(write_failed)?;
        let mut writer = BufWriter::new(file);
        let mut hasher = StreamingHasher::new();
        let mut buffer = vec![0u8; BLOCK_SIZE];
        let mut downloaded = 0u64;

        loop {
            let bytes_read = body.reader.read(&mut buffer).map_err(|e| ModError::Network {
                url: url.to_string(),
                reason: format!("read error: {}", e),
            })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(write_failed)?;
            hasher.update(&buffer[..bytes_read]);
            downloaded += bytes_read as u64;

            if let Some(ref cb) = self.progress {
                cb(downloaded, total.max(downloaded));
            }
        }

        writer.flush().map_err(write_failed)?;
        Ok(hasher.finish())
    }

    /// Verify a cached archive.
    ///
    /// - present, no known hash: accepted
    /// - present, hash matches: accepted
    /// - present, mismatch: with `refresh` the file is deleted, fetched again
    ///   and verified, otherwise [`ModError::ChecksumMismatch`] and the cache
    ///   is left untouched
    /// - absent: with `refresh` fetched and verified, otherwise
    ///   [`ModError::NotCached`]
    ///
    /// `url` is only resolved when a transfer is needed.
    pub fn check_cached(
        &self,
        path: &Path,
        hash: Option<&str>,
        refresh: bool,
        url: impl FnOnce() -> ModResult<String>,
    ) -> ModResult<()> {
        let filename = display_name(path);

        if path.exists() {
            let Some(expected) = hash else {
                return Ok(());
            };

            let actual = self.hash_file(path)?;
            if actual.eq_ignore_ascii_case(expected.trim()) {
                return Ok(());
            }

            if !refresh {
                return Err(ModError::ChecksumMismatch {
                    filename,
                    expected: expected.to_string(),
                    actual,
                });
            }

            tracing::info!(file = %filename, "Cached archive is stale, downloading again");
            fs::remove_file(path).map_err(|e| ModError::WriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        } else if !refresh {
            return Err(ModError::NotCached { filename });
        }

        let digest = self.fetch(&url()?, path)?;
        verify_digest(path, hash, digest)
    }

    /// Make sure the archive is in the cache and return once it is.
    ///
    /// With `use_cache`, an existing file whose hash matches (or whose hash is
    /// unknown) is reused without any request. Otherwise the file is fetched
    /// and overwritten, and the streamed digest is checked against `hash`.
    pub fn download_cached(
        &self,
        path: &Path,
        hash: Option<&str>,
        use_cache: bool,
        url: impl FnOnce() -> ModResult<String>,
    ) -> ModResult<()> {
        if use_cache && path.exists() {
            match hash {
                None => {
                    tracing::debug!(file = %path.display(), "Using cached archive");
                    return Ok(());
                }
                Some(expected) if self.hash_matches(path, expected)? => {
                    tracing::debug!(file = %path.display(), "Using verified cached archive");
                    return Ok(());
                }
                Some(_) => {}
            }
        }

        let digest = self.fetch(&url()?, path)?;
        verify_digest(path, hash, digest)
    }

    fn hash_file(&self, path: &Path) -> ModResult<String> {
        let progress = self.progress.as_deref().map(|cb| cb as &dyn Fn(u64, u64));
        crate::hash::checksum_with_progress(path, progress)
    }

    fn hash_matches(&self, path: &Path, expected: &str) -> ModResult<bool> {
        let progress = self.progress.as_deref().map(|cb| cb as &dyn Fn(u64, u64));
        check_hash(path, expected, progress)
    }
}

fn verify_digest(path: &Path, expected: Option<&str>, actual: String) -> ModResult<()> {
    match expected {
        Some(expected) if !actual.eq_ignore_ascii_case(expected.trim()) => {
            Err(ModError::ChecksumMismatch {
                filename: display_name(path),
                expected: expected.to_string(),
                actual,
            })
        }
        _ => Ok(()),
    }
}

fn remove_partial(path: &Path) {
    if path.is_file() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(file = %path.display(), error = %e, "Failed to remove partial download");
        }
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
