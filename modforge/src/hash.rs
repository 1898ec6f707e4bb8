//! MD5 checksum calculation for cached archives.
//!
//! Gallery landing pages publish MD5 digests, so every integrity check in the
//! pipeline compares lowercase hexadecimal MD5 strings.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ModError, ModResult};

/// Block size for streaming files through the hasher (1 MiB).
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Progress callback: `(bytes_processed, total_bytes)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Incremental MD5 state shared by file hashing and streamed downloads.
pub struct StreamingHasher {
    context: md5::Context,
}

impl Default for StreamingHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self {
            context: md5::Context::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
    }

    /// Consume the hasher and return the lowercase hex digest.
    pub fn finish(self) -> String {
        format!("{:x}", self.context.compute())
    }
}

/// Calculate the MD5 checksum of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn checksum(path: &Path) -> ModResult<String> {
    checksum_with_progress(path, None)
}

/// Calculate the MD5 checksum of a file, reporting progress after every block.
pub fn checksum_with_progress(
    path: &Path,
    progress: Option<&dyn Fn(u64, u64)>,
) -> ModResult<String> {
    let read_failed = |e| ModError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(path).map_err(read_failed)?;
    let total = file.metadata().map_err(read_failed)?.len();

    let mut hasher = StreamingHasher::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut processed = 0u64;

    loop {
        let bytes_read = file.read(&mut buffer).map_err(read_failed)?;
        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
        processed += bytes_read as u64;

        if let Some(cb) = progress {
            cb(processed, total);
        }
    }

    Ok(hasher.finish())
}

/// Check whether a file matches an expected MD5 digest.
///
/// The comparison ignores ASCII case since published digests are not
/// consistently lowercase.
pub fn check_hash(
    path: &Path,
    expected: &str,
    progress: Option<&dyn Fn(u64, u64)>,
) -> ModResult<bool> {
    let actual = checksum_with_progress(path, progress)?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}
