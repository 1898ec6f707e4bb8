//! Maker catalog (`modpack_maker_list.txt`) records.

use std::path::{PathBuf, MAIN_SEPARATOR};

use thiserror::Error;

/// Subdirectory field value meaning "use the archive root".
const NO_SUBDIRS: &str = "0";

/// Minimum number of tab-separated fields in a catalog line.
const MIN_FIELDS: usize = 4;

/// Per-line catalog failure. Reported and skipped, never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: expected at least 4 tab-separated fields, found {found}: {content}")]
    TooFewFields {
        line: usize,
        found: usize,
        content: String,
    },
}

/// One record of the maker catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Primary archive or repository location.
    pub content_url: String,
    /// Relative directories to install from, empty for the archive root.
    pub subdirs: Vec<PathBuf>,
    /// Author, with surrounding `-` and spaces stripped.
    pub author: String,
    /// Title, trimmed.
    pub title: String,
    /// Landing page carrying checksum and file name, empty when absent.
    pub info_url: String,
    /// Trailing arguments: explicit archive file name, then explicit hash.
    pub args: Vec<String>,
    /// Raw `title + author` concatenation used by the strict matching pass.
    pub match_key: String,
}

impl CatalogRecord {
    /// Parse one qualifying catalog line.
    ///
    /// `line_no` is only used for the error report.
    pub fn parse(line: &str, line_no: usize) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < MIN_FIELDS {
            return Err(ParseError::TooFewFields {
                line: line_no,
                found: fields.len(),
                content: line.to_string(),
            });
        }

        let args = fields
            .iter()
            .skip(5)
            .flat_map(|f| f.split(' '))
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            content_url: fields[0].trim().to_string(),
            subdirs: parse_subdirs(fields[1]),
            author: fields[2].trim_matches(|c| c == '-' || c == ' ').to_string(),
            title: fields[3].trim().to_string(),
            info_url: fields.get(4).map(|s| s.trim().to_string()).unwrap_or_default(),
            args,
            match_key: format!("{}{}", fields[3], fields[2]),
        })
    }

    /// Explicit archive file name from the trailing arguments.
    pub fn filename_override(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Explicit archive hash from the trailing arguments.
    pub fn hash_override(&self) -> Option<&str> {
        self.args.get(1).map(String::as_str)
    }
}

/// Decode the colon-separated subdirectory field.
///
/// Backslashes become the platform separator and leading separators are
/// stripped, so every entry is relative.
pub fn parse_subdirs(field: &str) -> Vec<PathBuf> {
    let field = field.trim();
    if field == NO_SUBDIRS {
        return Vec::new();
    }

    field
        .split(':')
        .map(|s| {
            s.replace('\\', &MAIN_SEPARATOR.to_string())
                .trim_start_matches(MAIN_SEPARATOR)
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Parse the catalog text.
///
/// Empty lines and lines starting with a space are continuation or comment
/// lines and are skipped silently. Lines with too few fields are returned as
/// errors alongside the records.
pub fn parse_catalog(text: &str) -> (Vec<CatalogRecord>, Vec<ParseError>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in text.split('\n').enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(' ') {
            continue;
        }

        match CatalogRecord::parse(line, idx + 1) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping catalog line");
                errors.push(e);
            }
        }
    }

    (records, errors)
}
