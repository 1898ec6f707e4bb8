//! Mods the catalog cannot locate on its own.
//!
//! Each entry is force-registered against the bulk large-file repository and
//! wins over any catalog record. The table is maintained by hand; keep the
//! regression test below in sync when editing it.

use super::descriptor::{ModDescriptor, ModKind};

/// Repository holding the bulk large-file resources.
pub const LARGE_FILES_REPOSITORY: &str = "https://github.com/Grokitach/gamma_large_files_v2";

/// A hand-maintained (author, title) registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardcodedException {
    pub author: &'static str,
    /// Also the directory name inside the repository.
    pub title: &'static str,
}

pub const EXCEPTIONS: &[HardcodedException] = &[
    HardcodedException {
        author: "Grokitach",
        title: "Large Files Textures",
    },
    HardcodedException {
        author: "Grokitach",
        title: "Large Files Sounds",
    },
];

impl HardcodedException {
    /// Manifest key the exception registers under.
    pub fn name(&self) -> String {
        format!("{} - {}", self.title, self.author)
    }

    pub fn descriptor(&self, enabled: bool) -> ModDescriptor {
        ModDescriptor {
            name: self.name(),
            enabled,
            title: self.title.to_string(),
            author: self.author.to_string(),
            content_url: LARGE_FILES_REPOSITORY.to_string(),
            info_url: LARGE_FILES_REPOSITORY.to_string(),
            subdirs: Vec::new(),
            kind: ModKind::GitResource,
            filename_override: None,
            hash_override: None,
            repository: Some(LARGE_FILES_REPOSITORY.to_string()),
        }
    }
}

/// Find the exception registered under a manifest key.
pub fn find(name: &str) -> Option<&'static HardcodedException> {
    EXCEPTIONS.iter().find(|e| e.name() == name)
}
