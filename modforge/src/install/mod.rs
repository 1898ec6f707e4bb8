//! Materialization of extracted content into the mods directory.
//!
//! Each mod gets `<mods_dir>/<name>/` holding the recognized game-data
//! directories of its content plus a `meta.ini` descriptor. Copies merge
//! into what is already there, so re-running an install is idempotent.
//!
//! Candidate sources of a mod are the extracted root followed by each
//! declared subdirectory. A candidate covered by a FOMOD folder directive is
//! copied to the directive destination; any other candidate contributes its
//! recognized directories (`gamedata`, `appdata`, `db`).

pub mod fomod;
pub mod meta;

use std::path::{Path, PathBuf};

use crate::archive::hotfix::RECOGNIZED_DIRS;
use crate::error::{ModError, ModResult};
use crate::fsutil::{copy_dir_recursive, create_dir_all, walk_dirs};
use crate::report::Diagnostic;
use crate::resolver::ModDescriptor;

pub use fomod::{read_directives, FolderDirective};
pub use meta::{mod_meta, separator_meta, write_meta, META_FILE};

/// Writes mods into a Mod Organizer `mods` directory.
#[derive(Debug, Clone)]
pub struct Materializer {
    mods_dir: PathBuf,
}

impl Materializer {
    pub fn new(mods_dir: impl Into<PathBuf>) -> Self {
        Self {
            mods_dir: mods_dir.into(),
        }
    }

    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    /// Install directory of a mod.
    pub fn install_dir(&self, name: &str) -> PathBuf {
        self.mods_dir.join(name)
    }

    /// Install extracted archive content.
    ///
    /// `installation_file` and the descriptor's provenance URL are recorded
    /// in `meta.ini`. Declared subdirectories missing from the content are
    /// returned as diagnostics.
    pub fn install(
        &self,
        descriptor: &ModDescriptor,
        extracted: &Path,
        installation_file: &str,
    ) -> ModResult<Vec<Diagnostic>> {
        let install_dir = self.install_dir(&descriptor.name);
        create_dir_all(&install_dir)?;

        let directives = read_directives(extracted)?;
        let mut diagnostics = Vec::new();

        let candidates = std::iter::once(extracted.to_path_buf())
            .chain(descriptor.subdirs.iter().map(|s| extracted.join(s)));

        for candidate in candidates {
            if !candidate.is_dir() {
                let directory = candidate
                    .strip_prefix(extracted)
                    .unwrap_or(&candidate)
                    .to_path_buf();
                tracing::warn!(
                    mod_name = %descriptor.name,
                    directory = %directory.display(),
                    "Declared directory does not exist"
                );
                diagnostics.push(Diagnostic::MissingDirective {
                    mod_name: descriptor.name.clone(),
                    directory,
                });
                continue;
            }

            let directive = directives
                .iter()
                .find(|d| extracted.join(&d.source) == candidate);
            if let Some(directive) = directive {
                let dest = install_dir.join(&directive.destination);
                tracing::debug!(
                    mod_name = %descriptor.name,
                    source = %candidate.display(),
                    dest = %dest.display(),
                    "Applying FOMOD directive"
                );
                copy_dir_recursive(&candidate, &dest)?;
                continue;
            }

            copy_recognized(&candidate, &install_dir)?;
        }

        write_meta(
            &mod_meta(installation_file, descriptor.provenance_url()),
            &install_dir,
        )?;

        tracing::info!(mod_name = %descriptor.name, dir = %install_dir.display(), "Installed");
        Ok(diagnostics)
    }

    /// Install one target of a shared repository checkout.
    ///
    /// Sources are the directories named after the target's title; without
    /// any, every directory holding a recognized game-data folder.
    pub fn install_git_target(
        &self,
        descriptor: &ModDescriptor,
        checkout: &Path,
        installation_file: &str,
    ) -> ModResult<()> {
        let sources = find_target_sources(checkout, &descriptor.title)?;
        if sources.is_empty() {
            return Err(ModError::SourceNotFound {
                name: descriptor.name.clone(),
            });
        }

        let install_dir = self.install_dir(&descriptor.name);
        create_dir_all(&install_dir)?;
        for source in &sources {
            copy_recognized(source, &install_dir)?;
        }

        write_meta(
            &mod_meta(installation_file, descriptor.provenance_url()),
            &install_dir,
        )?;

        tracing::info!(
            mod_name = %descriptor.name,
            sources = sources.len(),
            "Installed repository target"
        );
        Ok(())
    }

    /// Create the empty directory and placeholder descriptor of a separator.
    pub fn install_separator(&self, descriptor: &ModDescriptor) -> ModResult<()> {
        let install_dir = self.install_dir(&descriptor.name);
        create_dir_all(&install_dir)?;
        write_meta(&separator_meta(), &install_dir)?;
        tracing::info!(mod_name = %descriptor.name, "Installed separator");
        Ok(())
    }
}

fn copy_recognized(source: &Path, install_dir: &Path) -> ModResult<()> {
    for name in RECOGNIZED_DIRS {
        let dir = source.join(name);
        if dir.is_dir() {
            copy_dir_recursive(&dir, &install_dir.join(name))?;
        }
    }
    Ok(())
}

fn find_target_sources(checkout: &Path, title: &str) -> ModResult<Vec<PathBuf>> {
    let dirs = walk_dirs(checkout)?;

    let named: Vec<PathBuf> = dirs
        .iter()
        .filter(|d| !title.is_empty() && d.file_name().is_some_and(|n| n == title))
        .cloned()
        .collect();
    if !named.is_empty() {
        return Ok(named);
    }

    let mut parents: Vec<PathBuf> = dirs
        .iter()
        .filter(|d| {
            d.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| RECOGNIZED_DIRS.contains(&n))
        })
        .filter_map(|d| d.parent().map(Path::to_path_buf))
        .collect();
    parents.sort();
    parents.dedup();
    Ok(parents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRecord;
    use std::fs;
    use tempfile::TempDir;

    fn descriptor(subdirs: &str) -> ModDescriptor {
        let line = format!(
            "https://www.moddb.com/addons/start/1\t{}\t- Grokitach\tStash Overhaul\thttps://www.moddb.com/mods/stash",
            subdirs
        );
        let record = CatalogRecord::parse(&line, 1).unwrap();
        ModDescriptor::from_record("60- Stash Overhaul - Grokitach", true, &record)
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, path.display().to_string()).unwrap();
    }

    #[test]
    fn test_root_install_copies_recognized_dirs() {
        let temp = TempDir::new().unwrap();
        let extracted = temp.path().join("x");
        touch(&extracted.join("gamedata/configs/stash.ltx"));
        touch(&extracted.join("appdata/shaders.ltx"));
        touch(&extracted.join("readme.txt"));

        let materializer = Materializer::new(temp.path().join("mods"));
        let d = descriptor("0");
        let diagnostics = materializer.install(&d, &extracted, "stash.7z").unwrap();

        assert!(diagnostics.is_empty());
        let dir = materializer.install_dir(&d.name);
        assert!(dir.join("gamedata/configs/stash.ltx").is_file());
        assert!(dir.join("appdata/shaders.ltx").is_file());
        assert!(!dir.join("readme.txt").exists());

        let meta = fs::read_to_string(dir.join(META_FILE)).unwrap();
        assert!(meta.contains("installationFile=stash.7z"));
        assert!(meta.contains("url=https://www.moddb.com/mods/stash"));
    }

    #[test]
    fn test_subdirs_in_order_and_missing_warned() {
        let temp = TempDir::new().unwrap();
        let extracted = temp.path().join("x");
        fs::create_dir_all(extracted.join("1 - Main/gamedata")).unwrap();
        fs::write(extracted.join("1 - Main/gamedata/a.ltx"), "main").unwrap();
        fs::create_dir_all(extracted.join("2 - Patch/gamedata")).unwrap();
        fs::write(extracted.join("2 - Patch/gamedata/a.ltx"), "patch").unwrap();

        let materializer = Materializer::new(temp.path().join("mods"));
        let d = descriptor(r"1 - Main:2 - Patch:3 - Gone");
        let diagnostics = materializer.install(&d, &extracted, "a.zip").unwrap();

        let dir = materializer.install_dir(&d.name);
        assert_eq!(fs::read_to_string(dir.join("gamedata/a.ltx")).unwrap(), "patch");
        assert_eq!(
            diagnostics,
            vec![Diagnostic::MissingDirective {
                mod_name: d.name.clone(),
                directory: PathBuf::from("3 - Gone"),
            }]
        );
    }

    #[test]
    fn test_install_merges_with_existing_content() {
        let temp = TempDir::new().unwrap();
        let extracted = temp.path().join("x");
        touch(&extracted.join("gamedata/new.ltx"));

        let materializer = Materializer::new(temp.path().join("mods"));
        let d = descriptor("0");
        let dir = materializer.install_dir(&d.name);
        touch(&dir.join("gamedata/old.ltx"));

        materializer.install(&d, &extracted, "a.zip").unwrap();
        assert!(dir.join("gamedata/old.ltx").is_file());
        assert!(dir.join("gamedata/new.ltx").is_file());
    }

    #[test]
    fn test_fomod_directive_takes_precedence() {
        let temp = TempDir::new().unwrap();
        let extracted = temp.path().join("x");
        touch(&extracted.join("Core/configs/weapons.ltx"));
        touch(&extracted.join("Core/gamedata/ignored.ltx"));
        touch(&extracted.join("Extra/gamedata/extra.ltx"));
        fs::create_dir_all(extracted.join("fomod")).unwrap();
        fs::write(
            extracted.join(fomod::MODULE_CONFIG),
            r#"<config><folder source="Core" destination="gamedata"/></config>"#,
        )
        .unwrap();

        let materializer = Materializer::new(temp.path().join("mods"));
        let d = descriptor("Core:Extra");
        materializer.install(&d, &extracted, "pack.7z").unwrap();

        let dir = materializer.install_dir(&d.name);
        assert!(dir.join("gamedata/configs/weapons.ltx").is_file());
        assert!(dir.join("gamedata/gamedata/ignored.ltx").is_file());
        assert!(dir.join("gamedata/extra.ltx").is_file());
    }

    #[test]
    fn test_separator_placeholder() {
        let temp = TempDir::new().unwrap();
        let materializer = Materializer::new(temp.path());
        let d = ModDescriptor::separator("5-Gameplay_separator", true);

        materializer.install_separator(&d).unwrap();
        let dir = materializer.install_dir(&d.name);
        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let meta = fs::read_to_string(dir.join(META_FILE)).unwrap();
        assert!(meta.contains("category=0"));
    }

    #[test]
    fn test_git_target_by_title() {
        let temp = TempDir::new().unwrap();
        let checkout = temp.path().join("repo");
        touch(&checkout.join("Large Files Textures/gamedata/textures/a.dds"));
        touch(&checkout.join("Large Files Sounds/gamedata/sounds/a.ogg"));

        let d = crate::resolver::exceptions::EXCEPTIONS[0].descriptor(true);

        let materializer = Materializer::new(temp.path().join("mods"));
        materializer.install_git_target(&d, &checkout, "repo").unwrap();

        let dir = materializer.install_dir(&d.name);
        assert!(dir.join("gamedata/textures/a.dds").is_file());
        assert!(!dir.join("gamedata/sounds").exists());
    }

    #[test]
    fn test_git_target_falls_back_to_recognized_parents() {
        let temp = TempDir::new().unwrap();
        let checkout = temp.path().join("repo");
        touch(&checkout.join("addon/gamedata/scripts/a.script"));

        let mut d = descriptor("0");
        d.title = "Something Else".to_string();

        let materializer = Materializer::new(temp.path().join("mods"));
        materializer.install_git_target(&d, &checkout, "repo").unwrap();
        assert!(materializer
            .install_dir(&d.name)
            .join("gamedata/scripts/a.script")
            .is_file());
    }

    #[test]
    fn test_git_target_without_source() {
        let temp = TempDir::new().unwrap();
        let checkout = temp.path().join("repo");
        touch(&checkout.join("README.md"));

        let materializer = Materializer::new(temp.path().join("mods"));
        let err = materializer
            .install_git_target(&descriptor("0"), &checkout, "repo")
            .unwrap_err();
        assert!(matches!(err, ModError::SourceNotFound { .. }));
    }
}
