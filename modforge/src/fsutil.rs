//! Directory helpers shared by extraction, hotfixes and installation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ModError, ModResult};

pub(crate) fn create_dir_all(path: &Path) -> ModResult<()> {
    fs::create_dir_all(path).map_err(|e| ModError::CreateDirFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

pub(crate) fn read_dir(path: &Path) -> ModResult<Vec<PathBuf>> {
    let read_failed = |e| ModError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(path).map_err(read_failed)? {
        entries.push(entry.map_err(read_failed)?.path());
    }
    entries.sort();
    Ok(entries)
}

/// Copy a directory tree into `dest`, merging with what is already there.
///
/// Existing files at the destination are overwritten, other destination
/// files are left alone.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> ModResult<()> {
    create_dir_all(dest)?;

    for source_path in read_dir(source)? {
        let Some(name) = source_path.file_name() else {
            continue;
        };
        let dest_path = dest.join(name);

        if source_path.is_dir() {
            copy_dir_recursive(&source_path, &dest_path)?;
        } else {
            fs::copy(&source_path, &dest_path).map_err(|e| ModError::WriteFailed {
                path: dest_path,
                source: e,
            })?;
        }
    }

    Ok(())
}

/// Move `source` to `dest`. Directories are merged into an existing
/// destination and the emptied source is removed. A file never replaces an
/// existing directory.
pub fn move_merge(source: &Path, dest: &Path) -> ModResult<()> {
    let write_failed = |path: &Path, e| ModError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if source.is_dir() && dest.is_dir() {
        for child in read_dir(source)? {
            if let Some(name) = child.file_name() {
                move_merge(&child, &dest.join(name))?;
            }
        }
        return fs::remove_dir(source).map_err(|e| write_failed(source, e));
    }

    if let Some(parent) = dest.parent() {
        create_dir_all(parent)?;
    }
    if dest.is_dir() {
        let clash = io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} would replace a directory", source.display()),
        );
        return Err(write_failed(dest, clash));
    }
    fs::rename(source, dest).map_err(|e| write_failed(dest, e))
}

/// Count files recursively in a directory.
pub fn count_files_recursive(dir: &Path) -> ModResult<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for path in read_dir(dir)? {
        if path.is_dir() {
            count += count_files_recursive(&path)?;
        } else {
            count += 1;
        }
    }

    Ok(count)
}

/// Every directory below `root`, parents before children.
pub fn walk_dirs(root: &Path) -> ModResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for path in read_dir(&dir)? {
            if path.is_dir() && !path.is_symlink() {
                dirs.push(path.clone());
                pending.push(path);
            }
        }
    }

    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_merges_into_existing() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("textures")).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("textures/a.dds"), "new").unwrap();
        fs::write(src.join("b.ltx"), "new").unwrap();
        fs::write(dst.join("b.ltx"), "old").unwrap();
        fs::write(dst.join("keep.ltx"), "old").unwrap();

        copy_dir_recursive(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("b.ltx")).unwrap(), "new");
        assert_eq!(fs::read_to_string(dst.join("keep.ltx")).unwrap(), "old");
        assert!(dst.join("textures/a.dds").exists());
        assert_eq!(count_files_recursive(&dst).unwrap(), 3);
    }

    #[test]
    fn test_move_merge_directories() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("Gamedata");
        let dst = temp.path().join("gamedata");
        fs::create_dir_all(src.join("scripts")).unwrap();
        fs::create_dir_all(dst.join("scripts")).unwrap();
        fs::write(src.join("scripts/a.script"), "a").unwrap();
        fs::write(dst.join("scripts/b.script"), "b").unwrap();

        move_merge(&src, &dst).unwrap();

        assert!(!src.exists());
        assert!(dst.join("scripts/a.script").exists());
        assert!(dst.join("scripts/b.script").exists());
    }

    #[test]
    fn test_move_merge_file_onto_directory_fails() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("textures");
        let dst = temp.path().join("gamedata/textures");
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("keep.dds"), "keep").unwrap();
        fs::write(&src, "stray").unwrap();

        let result = move_merge(&src, &dst);

        assert!(matches!(result, Err(ModError::WriteFailed { .. })));
        assert!(dst.join("keep.dds").is_file());
        assert!(src.is_file());
    }

    #[test]
    fn test_walk_dirs_parents_first() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b/c")).unwrap();
        fs::write(temp.path().join("a/file"), "").unwrap();

        let dirs = walk_dirs(temp.path()).unwrap();
        assert_eq!(dirs.len(), 3);
        let pos = |p: &str| dirs.iter().position(|d| d.ends_with(p)).unwrap();
        assert!(pos("a") < pos("a/b"));
        assert!(pos("a/b") < pos("a/b/c"));
    }

    #[test]
    fn test_count_missing_dir() {
        assert_eq!(count_files_recursive(Path::new("/nonexistent/x")).unwrap(), 0);
    }
}
