//! Changed-line scoping: turns two refs into a [`ChangeSet`].

use diffscope_core::{ChangeSet, DiffScopeError, DiffTool, GitConfig, RefSelection};
use tracing::debug;

use crate::parser::{parse_unified_diff, FileDiff};

/// Computes which lines a pull request touched, through an injected [`DiffTool`].
///
/// # Examples
///
/// ```no_run
/// use diffscope_core::GitConfig;
/// use diffscope_difflens::scope::DiffScope;
/// # fn tool() -> Box<dyn diffscope_core::DiffTool> { unimplemented!() }
///
/// let tool = tool();
/// let config = GitConfig::default();
/// let changes = DiffScope::new(tool.as_ref(), &config)
///     .changed_lines(&["main", "feature"], None)
///     .unwrap();
/// for (path, lines) in changes.iter() {
///     println!("{}: {} lines", path.display(), lines.len());
/// }
/// ```
pub struct DiffScope<'a, T: DiffTool + ?Sized> {
    tool: &'a T,
    git: &'a GitConfig,
}

impl<'a, T: DiffTool + ?Sized> DiffScope<'a, T> {
    pub fn new(tool: &'a T, git: &'a GitConfig) -> Self {
        Self { tool, git }
    }

    /// Compute the changed lines between `refs`.
    ///
    /// When `remote_url` is given it is registered under the destination
    /// remote and fetched first; the second ref is then resolved against it.
    /// Without a `remote_url` both refs resolve against the origin remote.
    /// Blank refs are ignored, and with no refs left the result is an empty
    /// change set and no diff is requested.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::RemoteRegistration`] if the remote cannot be
    /// registered or fetched, [`DiffScopeError::RefResolution`] for unknown
    /// refs, [`DiffScopeError::Config`] for more than two refs, and
    /// [`DiffScopeError::Git`] for any other diff failure. No partial change
    /// set is returned.
    pub fn changed_lines<S: AsRef<str>>(
        &self,
        refs: &[S],
        remote_url: Option<&str>,
    ) -> Result<ChangeSet, DiffScopeError> {
        let selection = RefSelection::from_refs(refs)?;

        if let Some(url) = remote_url {
            debug!(remote = %self.git.destination_remote, url, "registering remote");
            self.tool
                .register_remote(&self.git.destination_remote, url)?;
            self.tool.update_remote(&self.git.destination_remote)?;
        }

        let Some(selection) = selection else {
            debug!("no refs given, nothing to diff");
            return Ok(ChangeSet::new());
        };

        let target_remote = if remote_url.is_some() {
            &self.git.destination_remote
        } else {
            &self.git.origin_remote
        };
        let qualified = selection.qualified(&self.git.origin_remote, target_remote);
        debug!(refs = %qualified, "requesting diff");

        let diff = self.tool.diff(&qualified)?;
        let changes = changed_lines_from_diff(&diff);
        debug!(
            files = changes.len(),
            lines = changes.line_count(),
            "computed change set"
        );
        Ok(changes)
    }
}

/// [`DiffScope::changed_lines`] with the default remote names
/// (`origin` and `destination`).
///
/// # Errors
///
/// See [`DiffScope::changed_lines`].
pub fn compute_changed_lines<T, S>(
    tool: &T,
    refs: &[S],
    remote_url: Option<&str>,
) -> Result<ChangeSet, DiffScopeError>
where
    T: DiffTool + ?Sized,
    S: AsRef<str>,
{
    let git = GitConfig::default();
    DiffScope::new(tool, &git).changed_lines(refs, remote_url)
}

/// Parse a unified diff and collect its changed lines.
///
/// # Examples
///
/// ```
/// use diffscope_difflens::scope::changed_lines_from_diff;
/// use std::path::Path;
///
/// let diff = "diff --git a/src/a.ts b/src/a.ts\n\
///             --- a/src/a.ts\n\
///             +++ b/src/a.ts\n\
///             @@ -1,2 +1,2 @@\n\
///             -old\n\
///             +new\n\
///             \x20same\n";
/// let changes = changed_lines_from_diff(diff);
/// assert!(changes.contains(Path::new("src/a.ts"), 1));
/// ```
pub fn changed_lines_from_diff(diff: &str) -> ChangeSet {
    collect_changed_lines(&parse_unified_diff(diff))
}

/// Collect addition and deletion line numbers per post-change path.
///
/// Deleted files and files without additions or deletions are left out.
pub fn collect_changed_lines(files: &[FileDiff]) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for file in files {
        if file.is_deleted() || file.new_path.as_os_str().is_empty() {
            continue;
        }
        changes.record(file.new_path.clone(), file.changed_lines());
    }
    changes
}
