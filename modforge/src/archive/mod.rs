//! Archive type detection, extraction and listing.
//!
//! The type is always sniffed from the first bytes of the file, never from
//! its extension. Zip, 7z and RAR are read in process. 7z archives using
//! filters the pure reader lacks, and RAR archives libunrar rejects, go
//! through an external 7-Zip executable.

pub mod hotfix;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{ModError, ModResult};
use crate::fsutil::{count_files_recursive, create_dir_all};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const RAR_MAGIC: &[u8] = b"Rar!";
const SEVEN_ZIP_MAGIC: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

/// Number of leading bytes inspected by [`detect_type`].
pub const SNIFF_LEN: usize = 16;

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveType {
    Zip,
    Rar,
    SevenZip,
    /// 7z using the BCJ2 filter. Only ever given as a hint; sniffing cannot
    /// tell it apart from [`ArchiveType::SevenZip`].
    SevenZipBcj2,
}

impl ArchiveType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::SevenZip => "7z",
            Self::SevenZipBcj2 => "7z-bcj2",
        }
    }

    /// Identify a format from leading bytes.
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        if header.starts_with(ZIP_MAGIC) || header.starts_with(ZIP_EMPTY_MAGIC) {
            Some(Self::Zip)
        } else if header.starts_with(RAR_MAGIC) {
            Some(Self::Rar)
        } else if header.starts_with(SEVEN_ZIP_MAGIC) {
            Some(Self::SevenZip)
        } else {
            None
        }
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the archive type of a file from its first [`SNIFF_LEN`] bytes.
///
/// # Errors
///
/// [`ModError::UnknownArchive`] when no signature matches, which usually
/// means the download returned an HTML page instead of the file.
pub fn detect_type(path: &Path) -> ModResult<ArchiveType> {
    let mut file = File::open(path).map_err(|e| ModError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.by_ref()
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|e| ModError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    ArchiveType::from_magic(&header).ok_or_else(|| ModError::UnknownArchive {
        path: path.to_path_buf(),
    })
}

/// Archive extractor dispatching on the sniffed type.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    seven_zip: PathBuf,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new(PathBuf::from("7z"))
    }
}

impl ArchiveExtractor {
    /// Create an extractor using the given 7-Zip executable.
    pub fn new(seven_zip: PathBuf) -> Self {
        Self { seven_zip }
    }

    /// Extract an archive into `dest_dir`, returning the number of files
    /// present there afterwards.
    pub fn extract(
        &self,
        archive: &Path,
        dest_dir: &Path,
        hint: Option<ArchiveType>,
    ) -> ModResult<usize> {
        let kind = match hint {
            Some(kind) => kind,
            None => detect_type(archive)?,
        };
        create_dir_all(dest_dir)?;

        tracing::debug!(
            archive = %archive.display(),
            dest = %dest_dir.display(),
            kind = %kind,
            "Extracting archive"
        );

        match kind {
            ArchiveType::Zip => extract_zip(archive, dest_dir)?,
            ArchiveType::SevenZip => self.extract_7z(archive, dest_dir)?,
            ArchiveType::Rar => self.extract_rar_with_fallback(archive, dest_dir)?,
            ArchiveType::SevenZipBcj2 => self.extract_external(archive, dest_dir)?,
        }

        count_files_recursive(dest_dir)
    }

    /// List entry names without extracting.
    pub fn list_contents(&self, archive: &Path, hint: Option<ArchiveType>) -> ModResult<Vec<String>> {
        let kind = match hint {
            Some(kind) => kind,
            None => detect_type(archive)?,
        };

        match kind {
            ArchiveType::Zip => list_zip(archive),
            ArchiveType::SevenZip => list_7z(archive).or_else(|e| {
                tracing::debug!(error = %e, "Falling back to 7-Zip executable for listing");
                self.list_external(archive)
            }),
            ArchiveType::Rar => list_rar(archive).or_else(|e| {
                tracing::debug!(error = %e, "Falling back to 7-Zip executable for listing");
                self.list_external(archive)
            }),
            ArchiveType::SevenZipBcj2 => self.list_external(archive),
        }
    }

    fn extract_rar_with_fallback(&self, archive: &Path, dest_dir: &Path) -> ModResult<()> {
        // libunrar trips over RAR5 reference records that 7-Zip handles.
        extract_rar(archive, dest_dir).or_else(|e| {
            tracing::info!(
                archive = %archive.display(),
                error = %e,
                "RAR extraction failed, using 7-Zip executable"
            );
            self.extract_external(archive, dest_dir)
        })
    }

    fn extract_7z(&self, archive: &Path, dest_dir: &Path) -> ModResult<()> {
        match sevenz_rust::decompress_file(archive, dest_dir) {
            Ok(()) => Ok(()),
            Err(sevenz_rust::Error::UnsupportedCompressionMethod(method)) => {
                tracing::info!(
                    archive = %archive.display(),
                    method = %method,
                    "Unsupported 7z filter, using 7-Zip executable"
                );
                self.extract_external(archive, dest_dir)
            }
            Err(e) => Err(ModError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    fn run_seven_zip(&self, archive: &Path, args: &[String]) -> ModResult<String> {
        let output = Command::new(&self.seven_zip)
            .args(args)
            .arg(archive)
            .output()
            .map_err(|e| ModError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: format!("failed to run {}: {}", self.seven_zip.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: format!("7z error while decompressing: {}", stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn extract_external(&self, archive: &Path, dest_dir: &Path) -> ModResult<()> {
        let args = vec![
            "x".to_string(),
            "-y".to_string(),
            format!("-o{}", dest_dir.display()),
        ];
        self.run_seven_zip(archive, &args).map(|_| ())
    }

    fn list_external(&self, archive: &Path) -> ModResult<Vec<String>> {
        let stdout = self.run_seven_zip(archive, &["l".to_string(), "-slt".to_string()])?;
        Ok(parse_slt_listing(&stdout))
    }
}

fn open_zip(archive: &Path) -> ModResult<zip::ZipArchive<BufReader<File>>> {
    let file = File::open(archive).map_err(|e| ModError::ReadFailed {
        path: archive.to_path_buf(),
        source: e,
    })?;

    zip::ZipArchive::new(BufReader::new(file)).map_err(|e| ModError::ExtractionFailed {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    })
}

fn extract_zip(archive: &Path, dest_dir: &Path) -> ModResult<()> {
    let mut zip = open_zip(archive)?;
    let failed = |e: &dyn fmt::Display| ModError::ExtractionFailed {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    };

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| failed(&e))?;
        // Entries escaping the destination are skipped.
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = %entry.name(), "Skipping unsafe zip entry");
            continue;
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path).map_err(|e| ModError::WriteFailed {
            path: out_path.clone(),
            source: e,
        })?;
        std::io::copy(&mut entry, &mut out).map_err(|e| ModError::WriteFailed {
            path: out_path.clone(),
            source: e,
        })?;
    }

    Ok(())
}

fn list_zip(archive: &Path) -> ModResult<Vec<String>> {
    let zip = open_zip(archive)?;
    Ok(zip.file_names().map(str::to_string).collect())
}

fn rar_failed(archive: &Path, e: impl fmt::Display) -> ModError {
    ModError::ExtractionFailed {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    }
}

fn extract_rar(archive: &Path, dest_dir: &Path) -> ModResult<()> {
    let mut rar = unrar::Archive::new(archive)
        .open_for_processing()
        .map_err(|e| rar_failed(archive, e))?;

    while let Some(header) = rar.read_header().map_err(|e| rar_failed(archive, e))? {
        rar = if header.entry().is_file() {
            header
                .extract_with_base(dest_dir)
                .map_err(|e| rar_failed(archive, e))?
        } else {
            header.skip().map_err(|e| rar_failed(archive, e))?
        };
    }

    Ok(())
}

fn list_rar(archive: &Path) -> ModResult<Vec<String>> {
    let listing = unrar::Archive::new(archive)
        .open_for_listing()
        .map_err(|e| rar_failed(archive, e))?;

    listing
        .map(|entry| {
            entry
                .map(|header| header.filename.to_string_lossy().into_owned())
                .map_err(|e| rar_failed(archive, e))
        })
        .collect()
}

fn list_7z(archive: &Path) -> ModResult<Vec<String>> {
    let reader = sevenz_rust::SevenZReader::open(archive, sevenz_rust::Password::empty())
        .map_err(|e| ModError::ExtractionFailed {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(reader
        .archive()
        .files
        .iter()
        .map(|entry| entry.name().to_string())
        .collect())
}

/// Parse `7z l -slt` output into entry paths.
///
/// The archive itself is described before the `----------` separator and is
/// not part of the result.
fn parse_slt_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip_while(|line| !line.starts_with("----------"))
        .filter_map(|line| line.strip_prefix("Path = "))
        .map(str::to_string)
        .collect()
}
