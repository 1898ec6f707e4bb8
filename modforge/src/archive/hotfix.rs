//! Post-extraction path repairs.
//!
//! Both fixes are idempotent and are skipped on Windows, where the
//! filesystem already treats `\` as a separator and ignores case.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ModError, ModResult};
use crate::fsutil::{move_merge, read_dir, walk_dirs};

/// Game data directories recognized by the installer, in canonical case.
pub const RECOGNIZED_DIRS: &[&str] = &["appdata", "db", "gamedata"];

/// What the fixes changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotfixReport {
    /// Entries renamed from backslash names into nested paths.
    pub separators_fixed: usize,
    /// Directories relocated to their canonical-case name.
    pub case_fixed: usize,
}

/// Run both fixes on an extraction root.
pub fn apply_all(root: &Path) -> ModResult<HotfixReport> {
    if cfg!(windows) {
        return Ok(HotfixReport::default());
    }

    let report = HotfixReport {
        separators_fixed: fix_malformed_separators(root)?,
        case_fixed: fix_path_case(root)?,
    };

    if report != HotfixReport::default() {
        tracing::debug!(
            root = %root.display(),
            separators = report.separators_fixed,
            case = report.case_fixed,
            "Repaired extracted paths"
        );
    }

    Ok(report)
}

/// Rename entries whose name embeds `\` into nested paths.
///
/// `textures\ui\icon.dds` becomes `textures/ui/icon.dds`. Empty files with
/// such names are directory markers written by broken archivers and are
/// deleted instead. Returns the number of repaired entries.
pub fn fix_malformed_separators(root: &Path) -> ModResult<usize> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    let mut markers = 0;
    for entry in all_entries(root)? {
        if !file_name(&entry).contains('\\') {
            continue;
        }
        if is_empty_file(&entry) {
            tracing::debug!(entry = %entry.display(), "Dropping directory marker");
            fs::remove_file(&entry).map_err(|e| ModError::WriteFailed {
                path: entry.clone(),
                source: e,
            })?;
            markers += 1;
        } else {
            candidates.push(entry);
        }
    }

    // Deepest first, so renaming a parent never invalidates a pending child.
    candidates.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

    for entry in &candidates {
        let Some(parent) = entry.parent() else {
            continue;
        };
        let mut target = parent.to_path_buf();
        for segment in file_name(entry).split('\\').filter(|s| !s.is_empty()) {
            target.push(segment);
        }

        if target != *entry {
            move_merge(entry, &target)?;
        }
    }

    Ok(candidates.len() + markers)
}

/// Relocate recognized directories whose name differs from the canonical
/// lowercase form only by case, at any depth.
///
/// Only the matching segment is lowercased, the rest of each path is kept.
/// Contents merge into an existing canonical directory. Returns the number of
/// relocated directories.
pub fn fix_path_case(root: &Path) -> ModResult<usize> {
    let mut candidates: Vec<PathBuf> = walk_dirs(root)?
        .into_iter()
        .filter(|dir| {
            let name = file_name(dir);
            let lower = name.to_lowercase();
            name != lower && RECOGNIZED_DIRS.contains(&lower.as_str())
        })
        .collect();

    candidates.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

    for dir in &candidates {
        let Some(parent) = dir.parent() else {
            continue;
        };
        let canonical = parent.join(file_name(dir).to_lowercase());

        // Step through a temporary name so case-insensitive filesystems
        // see two distinct paths.
        let staging = parent.join(format!(".{}.modforge-case", file_name(dir)));
        fs::rename(dir, &staging).map_err(|e| ModError::WriteFailed {
            path: staging.clone(),
            source: e,
        })?;
        move_merge(&staging, &canonical)?;
    }

    Ok(candidates.len())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_empty_file(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.is_file() && m.len() == 0)
}

fn all_entries(root: &Path) -> ModResult<Vec<PathBuf>> {
    let mut entries = read_dir(root)?;
    for dir in walk_dirs(root)? {
        entries.extend(read_dir(&dir)?);
    }
    Ok(entries)
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn relative_files(root: &Path) -> Vec<String> {
        let mut files: Vec<String> = all_entries(root)
            .unwrap()
            .into_iter()
            .filter(|p| p.is_file())
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_backslash_entries_become_nested() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "gamedata\\configs\\a.ltx", "a");
        touch(temp.path(), "gamedata\\textures\\b.dds", "b");
        touch(temp.path(), "readme.txt", "r");

        let fixed = fix_malformed_separators(temp.path()).unwrap();

        assert_eq!(fixed, 2);
        assert_eq!(
            relative_files(temp.path()),
            vec![
                "gamedata/configs/a.ltx",
                "gamedata/textures/b.dds",
                "readme.txt"
            ]
        );
    }

    #[test]
    fn test_backslash_entry_inside_directory() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "main/gamedata\\scripts\\x.script", "x");

        fix_malformed_separators(temp.path()).unwrap();
        assert_eq!(
            relative_files(temp.path()),
            vec!["main/gamedata/scripts/x.script"]
        );
    }

    #[test]
    fn test_directory_marker_keeps_subtree() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "gamedata/textures/keep.dds", "keep");
        touch(temp.path(), "gamedata\\textures", "");
        touch(temp.path(), "gamedata\\configs\\", "");
        touch(temp.path(), "gamedata\\configs\\a.ltx", "a");

        let fixed = fix_malformed_separators(temp.path()).unwrap();

        assert_eq!(fixed, 3);
        assert_eq!(
            relative_files(temp.path()),
            vec!["gamedata/configs/a.ltx", "gamedata/textures/keep.dds"]
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("gamedata/textures/keep.dds")).unwrap(),
            "keep"
        );
    }

    #[test]
    fn test_case_fix_merges_into_canonical() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "GameData/Configs/a.ltx", "a");
        touch(temp.path(), "gamedata/configs/b.ltx", "b");
        touch(temp.path(), "00 Main/DB/mods/c.db0", "c");

        let fixed = fix_path_case(temp.path()).unwrap();

        assert_eq!(fixed, 2);
        assert_eq!(
            relative_files(temp.path()),
            vec![
                "00 Main/db/mods/c.db0",
                "gamedata/Configs/a.ltx",
                "gamedata/configs/b.ltx",
            ]
        );
        assert!(!temp.path().join("GameData").exists());
    }

    #[test]
    fn test_unrecognized_names_untouched() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Textures/a.dds", "a");
        touch(temp.path(), "gamedata/Sounds/b.ogg", "b");

        assert_eq!(fix_path_case(temp.path()).unwrap(), 0);
        assert!(temp.path().join("Textures/a.dds").exists());
        assert!(temp.path().join("gamedata/Sounds/b.ogg").exists());
    }

    #[test]
    fn test_apply_all_idempotent() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "GAMEDATA\\scripts\\a.script", "a");

        let first = apply_all(temp.path()).unwrap();
        assert_eq!(first.separators_fixed, 1);
        assert_eq!(first.case_fixed, 1);
        assert_eq!(relative_files(temp.path()), vec!["gamedata/scripts/a.script"]);

        let second = apply_all(temp.path()).unwrap();
        assert_eq!(second, HotfixReport::default());
    }

    fn segment() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "gamedata", "GameData", "DB", "appdata", "AppData", "textures", "x",
        ])
    }

    proptest! {
        #[test]
        fn prop_normalized_tree_is_clean(
            paths in prop::collection::vec(
                (prop::collection::vec(segment(), 0..4), any::<bool>()),
                1..6,
            ),
        ) {
            let temp = TempDir::new().unwrap();
            for (i, (segments, backslash)) in paths.iter().enumerate() {
                let sep = if *backslash { "\\" } else { "/" };
                let mut rel = segments.join(sep);
                if !rel.is_empty() {
                    rel.push_str(sep);
                }
                rel.push_str(&format!("file{i}.txt"));
                touch(temp.path(), &rel, "data");
            }
            let before = relative_files(temp.path()).len();

            apply_all(temp.path()).unwrap();

            for entry in all_entries(temp.path()).unwrap() {
                let name = file_name(&entry);
                prop_assert!(!name.contains('\\'));
                let lower = name.to_lowercase();
                if entry.is_dir() && RECOGNIZED_DIRS.contains(&lower.as_str()) {
                    prop_assert_eq!(name, lower);
                }
            }
            prop_assert_eq!(relative_files(temp.path()).len(), before);
        }
    }
}
