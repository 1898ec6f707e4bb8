//! Repository-backed mods.
//!
//! A bare clone per repository is kept in the cache directory and fetched
//! into on every download. Extraction checks the resolved revision out into a
//! throwaway worktree and copies it to the destination, so the clone is never
//! re-created between installs.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::repo::RepoRef;
use super::source::ModSource;
use crate::error::{ModError, ModResult};
use crate::fsutil::{copy_dir_recursive, create_dir_all, read_dir};
use crate::resolver::ModKind;

const SHORT_COMMIT_LEN: usize = 7;

/// One repository fetch serving any number of install targets.
#[derive(Debug)]
pub struct GitSource {
    repo: RepoRef,
    remote: String,
    git: PathBuf,
    clone_dir: Option<PathBuf>,
    resolved_commit: Option<String>,
}

impl GitSource {
    pub fn new(repo: RepoRef, git: PathBuf) -> Self {
        let remote = repo.remote_url();
        Self {
            repo,
            remote,
            git,
            clone_dir: None,
            resolved_commit: None,
        }
    }

    /// Build from a repository URL.
    pub fn from_url(url: &str, git: PathBuf) -> ModResult<Self> {
        let repo = RepoRef::parse(url)
            .ok_or_else(|| ModError::InvalidUrl(format!("not a repository URL: {}", url)))?;
        Ok(Self::new(repo, git))
    }

    /// Fetch from another location than the canonical remote (mirrors,
    /// local clones).
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// Commit checked out by [`ModSource::extract`], known after a download.
    pub fn resolved_commit(&self) -> Option<&str> {
        self.resolved_commit.as_deref()
    }

    /// Name recorded as the installation file of checked-out content:
    /// the project followed by the abbreviated commit.
    pub fn installation_file(&self) -> String {
        let commit = self.resolved_commit.as_deref().unwrap_or_default();
        let short = commit.get(..SHORT_COMMIT_LEN).unwrap_or(commit);
        format!("{}-{}", self.repo.project, short)
    }

    fn bare_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(format!("{}.git", self.repo.project))
    }

    fn git_in<I, S>(&self, git_dir: &Path, args: I) -> ModResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.git);
        command.arg("--git-dir").arg(git_dir).args(args);
        self.run(command)
    }

    fn run(&self, mut command: Command) -> ModResult<String> {
        let output = command.output().map_err(|e| ModError::GitFailed {
            repository: self.remote.clone(),
            reason: format!("failed to run {}: {}", self.git.display(), e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModError::GitFailed {
                repository: self.remote.clone(),
                reason: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn ensure_clone(&self, bare: &Path) -> ModResult<()> {
        if !bare.join("HEAD").is_file() {
            create_dir_all(bare)?;
            let mut command = Command::new(&self.git);
            command.arg("init").arg("--bare").arg(bare);
            self.run(command)?;
        }

        let owner = self.repo.owner.as_str();
        let remotes = self.git_in(bare, ["remote"])?;
        if !remotes.lines().any(|r| r.trim() == owner) {
            self.git_in(bare, ["remote", "add", owner, self.remote.as_str()])?;
        }
        Ok(())
    }

    /// Commit the pinned revision or the remote default branch points at.
    fn resolve_revision(&self, bare: &Path) -> ModResult<String> {
        let owner = self.repo.owner.as_str();

        if let Some(revision) = self.repo.revision.as_deref() {
            for spec in revision_specs(owner, revision) {
                let verified = self.git_in(bare, ["rev-parse", "--verify", "--quiet", spec.as_str()]);
                if let Ok(commit) = verified {
                    return Ok(commit);
                }
            }
            return Err(ModError::GitFailed {
                repository: self.remote.clone(),
                reason: format!("revision {} not found", revision),
            });
        }

        self.git_in(bare, ["remote", "set-head", owner, "--auto"])?;
        let head = format!("{}/HEAD", owner);
        self.git_in(bare, ["rev-parse", head.as_str()])
    }
}

impl ModSource for GitSource {
    fn kind(&self) -> ModKind {
        ModKind::GitResource
    }

    fn check(&mut self, cache_dir: &Path, refresh: bool) -> ModResult<()> {
        let bare = self.bare_path(cache_dir);
        if bare.join("HEAD").is_file() {
            self.clone_dir = Some(bare);
            return Ok(());
        }
        if refresh {
            return self.download(cache_dir, false, None).map(|_| ());
        }
        Err(ModError::NotCached {
            filename: format!("{}.git", self.repo.project),
        })
    }

    /// Fetch the repository into its bare clone. `use_cache` and
    /// `expected_hash` have no meaning for a repository and are ignored.
    fn download(
        &mut self,
        cache_dir: &Path,
        _use_cache: bool,
        _expected_hash: Option<&str>,
    ) -> ModResult<PathBuf> {
        let bare = self.bare_path(cache_dir);
        self.ensure_clone(&bare)?;

        tracing::info!(repository = %self.remote, clone = %bare.display(), "Fetching repository");
        self.git_in(&bare, ["fetch", "--tags", self.repo.owner.as_str()])?;

        let commit = self.resolve_revision(&bare)?;
        tracing::debug!(repository = %self.remote, commit = %commit, "Resolved revision");

        self.resolved_commit = Some(commit);
        self.clone_dir = Some(bare.clone());
        Ok(bare)
    }

    fn extract(&self, dest: &Path) -> ModResult<()> {
        let (Some(bare), Some(commit)) = (self.clone_dir.as_deref(), self.resolved_commit.as_deref())
        else {
            return Err(ModError::ArchiveUnavailable {
                name: self.repo.project.clone(),
            });
        };

        let scratch = tempfile::TempDir::new().map_err(|e| ModError::CreateDirFailed {
            path: std::env::temp_dir(),
            source: e,
        })?;
        let worktree = scratch.path().join(&self.repo.project);

        self.git_in(bare, [
            OsStr::new("worktree"),
            OsStr::new("add"),
            OsStr::new("--detach"),
            worktree.as_os_str(),
            OsStr::new(commit),
        ])?;

        let copied = copy_worktree(&worktree, dest);
        drop(scratch);
        self.git_in(bare, ["worktree", "prune"])?;
        copied
    }

    fn archive(&self) -> Option<&Path> {
        self.clone_dir.as_deref()
    }
}

/// Rev-parse specs for a pinned revision: the remote branch first, then the
/// name as given (tags, commit hashes).
fn revision_specs(owner: &str, revision: &str) -> [String; 2] {
    [
        format!("{}/{}^{{commit}}", owner, revision),
        format!("{}^{{commit}}", revision),
    ]
}

fn copy_worktree(worktree: &Path, dest: &Path) -> ModResult<()> {
    create_dir_all(dest)?;
    for entry in read_dir(worktree)? {
        let Some(name) = entry.file_name() else {
            continue;
        };
        if name == ".git" {
            continue;
        }
        let target = dest.join(name);
        if entry.is_dir() {
            copy_dir_recursive(&entry, &target)?;
        } else {
            std::fs::copy(&entry, &target).map_err(|e| ModError::WriteFailed {
                path: target.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .current_dir(dir)
            .args(["-c", "user.name=test", "-c", "user.email=test@example.org"])
            .args(args)
            .output()
            .unwrap();
        assert!(status.status.success(), "git {:?}: {:?}", args, status);
    }

    /// Upstream repository with two targets and a tag on the first commit.
    fn upstream(root: &Path) -> PathBuf {
        let repo = root.join("upstream");
        std::fs::create_dir_all(repo.join("Large Files Textures/gamedata/textures")).unwrap();
        std::fs::write(
            repo.join("Large Files Textures/gamedata/textures/a.dds"),
            b"v1",
        )
        .unwrap();

        git(&repo, &["init", "-q"]);
        git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "-q", "-m", "first"]);
        git(&repo, &["tag", "v1"]);

        std::fs::write(
            repo.join("Large Files Textures/gamedata/textures/a.dds"),
            b"v2",
        )
        .unwrap();
        git(&repo, &["commit", "-q", "-am", "second"]);
        repo
    }

    fn source(url: &str, upstream: &Path) -> GitSource {
        GitSource::from_url(url, PathBuf::from("git"))
            .unwrap()
            .with_remote(upstream.display().to_string())
    }

    #[test]
    #[ignore = "needs git on PATH"]
    fn test_default_branch_checkout() {
        let temp = TempDir::new().unwrap();
        let upstream = upstream(temp.path());
        let cache = temp.path().join("cache");

        let mut source = source("https://github.com/Grokitach/gamma_large_files_v2", &upstream);
        let clone = source.download(&cache, true, None).unwrap();
        assert_eq!(clone, cache.join("gamma_large_files_v2.git"));
        assert_eq!(source.resolved_commit().map(str::len), Some(40));

        let out = temp.path().join("out");
        source.extract(&out).unwrap();
        let file = out.join("Large Files Textures/gamedata/textures/a.dds");
        assert_eq!(std::fs::read(file).unwrap(), b"v2");
        assert!(!out.join(".git").exists());

        // Second fetch reuses the clone.
        source.download(&cache, true, None).unwrap();
        source.check(&cache, false).unwrap();
    }

    #[test]
    #[ignore = "needs git on PATH"]
    fn test_pinned_revision_checkout() {
        let temp = TempDir::new().unwrap();
        let upstream = upstream(temp.path());

        let mut source = source(
            "https://github.com/Grokitach/gamma_large_files_v2/archive/refs/tags/v1.zip",
            &upstream,
        );
        source.download(&temp.path().join("cache"), false, None).unwrap();

        let out = temp.path().join("out");
        source.extract(&out).unwrap();
        let file = out.join("Large Files Textures/gamedata/textures/a.dds");
        assert_eq!(std::fs::read(file).unwrap(), b"v1");
    }

    const FAKE_COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

    /// Stand-in git executable that logs its arguments and answers
    /// `rev-parse` with a fixed commit.
    #[cfg(unix)]
    fn fake_git(dir: &Path) -> (PathBuf, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("git.log");
        let script = dir.join("git");
        let body = format!(
            "#!/bin/sh\n\
             echo \"$*\" >> '{log}'\n\
             case \"$1\" in init) mkdir -p \"$3\" && touch \"$3/HEAD\" ;; esac\n\
             case \"$*\" in *rev-parse*) echo {FAKE_COMMIT} ;; esac\n",
            log = log.display()
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }

    #[cfg(unix)]
    #[test]
    fn test_download_command_sequence() {
        let temp = TempDir::new().unwrap();
        let (git, log) = fake_git(temp.path());
        let cache = temp.path().join("cache");

        let mut source =
            GitSource::from_url("https://github.com/Grokitach/gamma_large_files_v2", git).unwrap();
        let clone = source.download(&cache, true, None).unwrap();

        assert_eq!(clone, cache.join("gamma_large_files_v2.git"));
        assert_eq!(source.resolved_commit(), Some(FAKE_COMMIT));
        assert_eq!(source.installation_file(), "gamma_large_files_v2-0123456");

        let calls: Vec<String> = std::fs::read_to_string(&log)
            .unwrap()
            .lines()
            .map(|line| line.replace(&clone.display().to_string(), "<bare>"))
            .collect();
        assert_eq!(
            calls,
            vec![
                "init --bare <bare>",
                "--git-dir <bare> remote",
                "--git-dir <bare> remote add Grokitach https://github.com/Grokitach/gamma_large_files_v2",
                "--git-dir <bare> fetch --tags Grokitach",
                "--git-dir <bare> remote set-head Grokitach --auto",
                "--git-dir <bare> rev-parse Grokitach/HEAD",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_pinned_revision_tries_remote_branch_first() {
        let temp = TempDir::new().unwrap();
        let (git, log) = fake_git(temp.path());

        let mut source = GitSource::from_url(
            "https://github.com/Grokitach/gamma_large_files_v2/archive/refs/heads/dev.zip",
            git,
        )
        .unwrap();
        source.download(&temp.path().join("cache"), true, None).unwrap();

        let calls = std::fs::read_to_string(&log).unwrap();
        let last = calls.lines().last().unwrap();
        assert!(last.ends_with("rev-parse --verify --quiet Grokitach/dev^{commit}"), "{}", last);
        assert!(!calls.contains("set-head"));
    }

    #[test]
    fn test_revision_specs_order() {
        assert_eq!(
            revision_specs("Grokitach", "v1"),
            ["Grokitach/v1^{commit}".to_string(), "v1^{commit}".to_string()]
        );
    }

    #[test]
    fn test_installation_file_names() {
        let mut source =
            GitSource::from_url("https://github.com/Grokitach/gamma_large_files_v2", PathBuf::from("git"))
                .unwrap();
        assert_eq!(source.installation_file(), "gamma_large_files_v2-");

        source.resolved_commit = Some("abc".to_string());
        assert_eq!(source.installation_file(), "gamma_large_files_v2-abc");

        source.resolved_commit = Some(FAKE_COMMIT.to_string());
        assert_eq!(source.installation_file(), "gamma_large_files_v2-0123456");
    }

    #[test]
    fn test_check_without_clone() {
        let temp = TempDir::new().unwrap();
        let mut source = GitSource::from_url(
            "https://github.com/Grokitach/gamma_large_files_v2",
            PathBuf::from("git"),
        )
        .unwrap();

        assert!(matches!(
            source.check(temp.path(), false),
            Err(ModError::NotCached { .. })
        ));
    }

    #[test]
    fn test_missing_git_binary() {
        let temp = TempDir::new().unwrap();
        let mut source = GitSource::from_url(
            "https://github.com/Grokitach/gamma_large_files_v2",
            PathBuf::from("/nonexistent/git"),
        )
        .unwrap();

        let err = source.download(temp.path(), false, None).unwrap_err();
        assert!(matches!(err, ModError::GitFailed { .. }));
    }

    #[test]
    fn test_extract_before_download() {
        let temp = TempDir::new().unwrap();
        let source = GitSource::from_url("https://github.com/a/b", PathBuf::from("git")).unwrap();
        assert!(matches!(
            source.extract(temp.path()),
            Err(ModError::ArchiveUnavailable { .. })
        ));
    }

    #[test]
    fn test_rejects_non_repository_url() {
        assert!(GitSource::from_url("https://example.org/x.zip", PathBuf::from("git")).is_err());
    }
}
