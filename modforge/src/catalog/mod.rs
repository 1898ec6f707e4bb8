//! Catalog parsing.
//!
//! Two text inputs describe a modpack:
//! - the manifest (`modlist.txt`): ordered `+`/`-` lines defining install
//!   order and the active set
//! - the maker catalog (`modpack_maker_list.txt`): tab-separated records with
//!   download location and install directives
//!
//! Both parsers are lenient: lines that do not qualify are skipped, and
//! malformed catalog lines are reported as [`ParseError`] without aborting.
//! Only an unreadable catalog file is fatal.

mod manifest;
mod record;

pub use manifest::{parse_manifest, ManifestLine};
pub use record::{parse_catalog, parse_subdirs, CatalogRecord, ParseError};

use std::fs;
use std::path::Path;

use crate::error::{ModError, ModResult};

/// Default manifest file name inside a modpack data directory.
pub const MANIFEST_FILE: &str = "modlist.txt";

/// Default maker catalog file name inside a modpack data directory.
pub const CATALOG_FILE: &str = "modpack_maker_list.txt";

/// Both catalogs, parsed.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    /// Ordered manifest lines.
    pub manifest: Vec<ManifestLine>,
    /// Parsed maker records, in file order.
    pub records: Vec<CatalogRecord>,
    /// Catalog lines that were skipped.
    pub parse_errors: Vec<ParseError>,
}

impl Catalogs {
    /// Parse both catalogs from their text.
    pub fn parse(manifest_text: &str, catalog_text: &str) -> Self {
        let manifest = parse_manifest(manifest_text);
        let (records, parse_errors) = parse_catalog(catalog_text);

        Self {
            manifest,
            records,
            parse_errors,
        }
    }

    /// Read `modlist.txt` and `modpack_maker_list.txt` from a directory.
    pub fn load_dir(dir: &Path) -> ModResult<Self> {
        Self::load(&dir.join(MANIFEST_FILE), &dir.join(CATALOG_FILE))
    }

    /// Read both catalogs from explicit paths.
    pub fn load(manifest_path: &Path, catalog_path: &Path) -> ModResult<Self> {
        tracing::info!(
            manifest = %manifest_path.display(),
            catalog = %catalog_path.display(),
            "Reading mod definition"
        );

        let read = |path: &Path| {
            fs::read_to_string(path).map_err(|e| ModError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })
        };

        Ok(Self::parse(&read(manifest_path)?, &read(catalog_path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), "+1- Mod - Me\n").unwrap();
        fs::write(
            temp.path().join(CATALOG_FILE),
            "http://x/mod.zip\t0\t- Me\tMod \n",
        )
        .unwrap();

        let catalogs = Catalogs::load_dir(temp.path()).unwrap();
        assert_eq!(catalogs.manifest.len(), 1);
        assert_eq!(catalogs.records.len(), 1);
        assert!(catalogs.parse_errors.is_empty());
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), "+a\n").unwrap();

        let result = Catalogs::load_dir(temp.path());
        assert!(matches!(result, Err(ModError::ReadFailed { .. })));
    }
}
