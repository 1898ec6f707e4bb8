//! Mod Organizer `meta.ini` descriptor files.

use std::path::Path;

use ini::{EscapePolicy, Ini, WriteOption};

use crate::error::{ModError, ModResult};

/// Descriptor file name inside each mod directory.
pub const META_FILE: &str = "meta.ini";

const GAME_NAME: &str = "stalkeranomaly";
const LAST_MODIFIED: &str = "2021-11-09T18:10:18Z";
const COLOR: &str = r"@Variant(\0\0\0\x43\0\xff\xff\0\0\0\0\0\0\0\0)";

/// Descriptor of an installed mod: the archive it came from and where it
/// was published.
pub fn mod_meta(installation_file: &str, url: &str) -> Ini {
    let mut ini = Ini::new();
    ini.with_section(Some("General"))
        .set("gameName", GAME_NAME)
        .set("modid", "0")
        .set("ignoredversion", installation_file)
        .set("version", installation_file)
        .set("newestversion", installation_file)
        .set("category", "\"-1,\"")
        .set("nexusFileStatus", "1")
        .set("installationFile", installation_file)
        .set("repository", "")
        .set("comments", "")
        .set("notes", "")
        .set("nexusDescription", "")
        .set("url", url)
        .set("hasCustomURL", "true")
        .set("lastNexusQuery", "")
        .set("lastNexusUpdate", "")
        .set("nexusLastModified", LAST_MODIFIED)
        .set("converted", "false")
        .set("validated", "false")
        .set("color", COLOR)
        .set("tracked", "0");
    ini.with_section(Some("installedFiles"))
        .set(r"1\modid", "0")
        .set(r"1\fileid", "0")
        .set("size", "1");
    ini
}

/// Placeholder descriptor of a separator.
pub fn separator_meta() -> Ini {
    let mut ini = Ini::new();
    ini.with_section(Some("General"))
        .set("modid", "0")
        .set("version", "")
        .set("newestVersion", "")
        .set("category", "0")
        .set("installationFile", "");
    ini.with_section(Some("installedFiles")).set("size", "0");
    ini
}

/// Write a descriptor verbatim. Mod Organizer reads backslashes and quotes
/// literally, so nothing is escaped.
pub fn write_meta(ini: &Ini, dir: &Path) -> ModResult<()> {
    let path = dir.join(META_FILE);
    let options = WriteOption {
        escape_policy: EscapePolicy::Nothing,
        ..Default::default()
    };

    ini.write_to_file_opt(&path, options)
        .map_err(|e| ModError::WriteFailed { path, source: e })
}
