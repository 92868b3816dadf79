use std::path::{Path, PathBuf};

use diffscope_core::{DiffScopeError, DiffTool, GitConfig, RefSelection};
use git2::{DiffFindOptions, DiffFormat, DiffOptions};
use tracing::debug;

/// A git working directory that change sets are computed against.
///
/// Implements [`DiffTool`] with libgit2: remotes are registered in the
/// repository config, fetched in-process, and diffs are rendered as unified
/// patch text.
///
/// # Examples
///
/// ```no_run
/// use diffscope_core::{DiffTool, RefSelection};
/// use diffscope_git::GitRepository;
/// use std::path::Path;
///
/// let repo = GitRepository::open(Path::new(".")).unwrap();
/// let patch = repo
///     .diff(&RefSelection::Single("origin/main".into()))
///     .unwrap();
/// println!("{patch}");
/// ```
pub struct GitRepository {
    inner: git2::Repository,
    root: PathBuf,
    context_lines: u32,
    detect_renames: bool,
}

impl GitRepository {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::Git`] if `path` is not inside a git
    /// repository with a working directory.
    pub fn open(path: &Path) -> Result<Self, DiffScopeError> {
        let inner = git2::Repository::discover(path).map_err(|e| {
            DiffScopeError::Git(format!(
                "not a git repository: '{}': {}",
                path.display(),
                e.message()
            ))
        })?;

        let root = inner
            .workdir()
            .ok_or_else(|| {
                DiffScopeError::Git(format!(
                    "repository at '{}' has no working directory",
                    path.display()
                ))
            })?
            .to_path_buf();

        let defaults = GitConfig::default();
        Ok(Self {
            inner,
            root,
            context_lines: defaults.context_lines,
            detect_renames: defaults.detect_renames,
        })
    }

    /// Apply diff options from `[git]` configuration.
    pub fn with_config(mut self, config: &GitConfig) -> Self {
        self.context_lines = config.context_lines;
        self.detect_renames = config.detect_renames;
        self
    }

    /// Root of the working directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full SHA of the commit `HEAD` points at.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::RefResolution`] if `HEAD` is unborn.
    pub fn head_sha(&self) -> Result<String, DiffScopeError> {
        let commit = self
            .inner
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(|_| DiffScopeError::RefResolution {
                refspec: "HEAD".into(),
            })?;
        Ok(commit.id().to_string())
    }

    fn resolve_tree(&self, refspec: &str) -> Result<git2::Tree<'_>, DiffScopeError> {
        let not_found = || DiffScopeError::RefResolution {
            refspec: refspec.to_string(),
        };
        self.inner
            .revparse_single(refspec)
            .map_err(|_| not_found())?
            .peel_to_tree()
            .map_err(|_| not_found())
    }

    fn build_diff(&self, refs: &RefSelection) -> Result<git2::Diff<'_>, DiffScopeError> {
        let mut opts = DiffOptions::new();
        opts.context_lines(self.context_lines);

        let diff = match refs {
            RefSelection::Single(refspec) => {
                let tree = self.resolve_tree(refspec)?;
                self.inner
                    .diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))
            }
            RefSelection::Pair { base, target } => {
                let old_tree = self.resolve_tree(base)?;
                let new_tree = self.resolve_tree(target)?;
                self.inner
                    .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))
            }
        };
        let mut diff = diff.map_err(|e| DiffScopeError::Git(format!("failed to compute diff: {e}")))?;

        if self.detect_renames {
            let mut find_opts = DiffFindOptions::new();
            find_opts.renames(true);
            diff.find_similar(Some(&mut find_opts))
                .map_err(|e| DiffScopeError::Git(format!("rename detection failed: {e}")))?;
        }

        Ok(diff)
    }
}

impl DiffTool for GitRepository {
    fn register_remote(&self, name: &str, url: &str) -> Result<(), DiffScopeError> {
        let failed = |reason: String| DiffScopeError::RemoteRegistration {
            remote: name.to_string(),
            url: url.to_string(),
            reason,
        };

        if url.trim().is_empty() {
            return Err(failed("remote URL is empty".into()));
        }

        let current_url = match self.inner.find_remote(name) {
            Ok(remote) => Some(remote.url().unwrap_or_default().to_string()),
            Err(_) => None,
        };

        match current_url {
            Some(existing) if existing == url => {
                debug!(remote = name, url, "remote already registered");
            }
            Some(existing) => {
                debug!(remote = name, from = %existing, to = url, "repointing remote");
                self.inner
                    .remote_set_url(name, url)
                    .map_err(|e| failed(e.message().to_string()))?;
            }
            None => {
                debug!(remote = name, url, "adding remote");
                self.inner
                    .remote(name, url)
                    .map_err(|e| failed(e.message().to_string()))?;
            }
        }
        Ok(())
    }

    fn update_remote(&self, name: &str) -> Result<(), DiffScopeError> {
        let mut remote = self
            .inner
            .find_remote(name)
            .map_err(|e| DiffScopeError::RemoteRegistration {
                remote: name.to_string(),
                url: String::new(),
                reason: e.message().to_string(),
            })?;
        let url = remote.url().unwrap_or_default().to_string();

        debug!(remote = name, url = %url, "fetching remote");
        remote
            .fetch(&[] as &[&str], None, None)
            .map_err(|e| DiffScopeError::RemoteRegistration {
                remote: name.to_string(),
                url,
                reason: e.message().to_string(),
            })
    }

    fn diff(&self, refs: &RefSelection) -> Result<String, DiffScopeError> {
        let diff = self.build_diff(refs)?;
        render_patch(&diff)
    }
}

/// Render a git2 diff as unified patch text, the same shape `git diff` prints.
fn render_patch(diff: &git2::Diff<'_>) -> Result<String, DiffScopeError> {
    let mut patch = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let origin = line.origin();
        if matches!(origin, '+' | '-' | ' ') {
            patch.push(origin);
        }
        patch.push_str(&String::from_utf8_lossy(line.content()));
        true
    })
    .map_err(|e| DiffScopeError::Git(format!("failed to render diff: {e}")))?;
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, GitRepository) {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.txt")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();
        let opened = GitRepository::open(dir.path()).unwrap();
        (dir, opened)
    }

    #[test]
    fn open_outside_repository_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            GitRepository::open(dir.path()),
            Err(DiffScopeError::Git(_))
        ));
    }

    #[test]
    fn working_tree_diff_renders_patch_text() {
        let (dir, repo) = setup_repo();
        fs::write(dir.path().join("a.txt"), "one\nTWO\nthree\n").unwrap();

        let patch = repo.diff(&RefSelection::Single("HEAD".into())).unwrap();
        assert!(patch.starts_with("diff --git a/a.txt b/a.txt"));
        assert!(patch.contains("@@ -1,3 +1,3 @@"));
        assert!(patch.contains("\n-two\n"));
        assert!(patch.contains("\n+TWO\n"));
        assert!(patch.contains("\n one\n"));
    }

    #[test]
    fn unknown_ref_is_a_resolution_error() {
        let (_dir, repo) = setup_repo();
        let err = repo
            .diff(&RefSelection::Single("origin/missing".into()))
            .unwrap_err();
        assert!(matches!(err, DiffScopeError::RefResolution { refspec } if refspec == "origin/missing"));
    }

    #[test]
    fn empty_remote_url_is_rejected() {
        let (_dir, repo) = setup_repo();
        let err = repo.register_remote("destination", "  ").unwrap_err();
        assert!(matches!(err, DiffScopeError::RemoteRegistration { .. }));
    }

    #[test]
    fn register_remote_is_idempotent_and_repoints() {
        let (dir, repo) = setup_repo();
        repo.register_remote("destination", "/tmp/fork-one").unwrap();
        repo.register_remote("destination", "/tmp/fork-one").unwrap();
        repo.register_remote("destination", "/tmp/fork-two").unwrap();

        let raw = git2::Repository::open(dir.path()).unwrap();
        let remote = raw.find_remote("destination").unwrap();
        assert_eq!(remote.url(), Some("/tmp/fork-two"));
    }

    #[test]
    fn updating_unknown_remote_fails() {
        let (_dir, repo) = setup_repo();
        assert!(matches!(
            repo.update_remote("nope"),
            Err(DiffScopeError::RemoteRegistration { .. })
        ));
    }

    #[test]
    fn head_sha_is_full_length() {
        let (_dir, repo) = setup_repo();
        assert_eq!(repo.head_sha().unwrap().len(), 40);
    }
}
