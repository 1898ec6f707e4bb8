//! FOMOD folder directives.
//!
//! Only `<folder source=".." destination=".."/>` elements of
//! `fomod/ModuleConfig.xml` are honoured; conditions and install steps are
//! not evaluated.

use std::fs;
use std::path::{Component, Path, PathBuf};

use roxmltree::{Document, ParsingOptions};

use crate::error::{ModError, ModResult};

/// Location of the FOMOD configuration below an extracted root.
pub const MODULE_CONFIG: &str = "fomod/ModuleConfig.xml";

/// One source → destination folder mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderDirective {
    /// Path relative to the extracted root.
    pub source: PathBuf,
    /// Path relative to the mod install directory. Empty for the directory
    /// itself.
    pub destination: PathBuf,
}

/// Parse folder directives from ModuleConfig.xml content.
///
/// Every `folder` element with a `source` attribute is a directive, in
/// document order. Comments and CDATA are not elements and never match.
pub fn parse_directives(xml: &str) -> Result<Vec<FolderDirective>, roxmltree::Error> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(xml, options)?;

    Ok(document
        .descendants()
        .filter(|node| node.has_tag_name("folder"))
        .filter_map(|node| {
            Some(FolderDirective {
                source: relative_path(node.attribute("source")?),
                destination: relative_path(node.attribute("destination").unwrap_or_default()),
            })
        })
        .collect())
}

/// Read the directives of an extracted root. No configuration file means no
/// directives.
pub fn read_directives(root: &Path) -> ModResult<Vec<FolderDirective>> {
    let path = root.join(MODULE_CONFIG);
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let bytes = fs::read(&path).map_err(|e| ModError::ReadFailed {
        path: path.clone(),
        source: e,
    })?;
    let directives =
        parse_directives(&decode(&bytes)).map_err(|e| ModError::InvalidModuleConfig {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    tracing::debug!(config = %path.display(), count = directives.len(), "FOMOD directives");
    Ok(directives)
}

/// ModuleConfig.xml is frequently saved as UTF-16 by Windows tooling, which
/// the XML reader does not decode itself.
fn decode(bytes: &[u8]) -> String {
    let utf16 = |le: bool| {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| {
                if le {
                    u16::from_le_bytes([c[0], c[1]])
                } else {
                    u16::from_be_bytes([c[0], c[1]])
                }
            })
            .collect();
        String::from_utf16_lossy(&units)
    };

    match bytes {
        [0xFF, 0xFE, ..] => utf16(true),
        [0xFE, 0xFF, ..] => utf16(false),
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Backslash-separated, possibly rooted, path to a clean relative path.
/// Parent components are dropped so a directive cannot leave its root.
fn relative_path(value: &str) -> PathBuf {
    let normalized = value.trim().replace('\\', "/");
    Path::new(&normalized)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}
