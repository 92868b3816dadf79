//! Narrow scanner findings down to the lines a pull request changed.

use std::path::{Component, Path, PathBuf};

use diffscope_core::ChangeSet;
use tracing::debug;

use crate::violation::{ScanResult, Violation};

/// A finding that falls on a changed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedViolation {
    /// Repository-relative path.
    pub path: PathBuf,
    pub engine: String,
    pub violation: Violation,
}

/// Keep the findings whose `line..=endLine` range touches a changed line of
/// their file.
///
/// Absolute scanner paths are made relative to `repo_root` before lookup.
///
/// # Examples
///
/// ```
/// use diffscope_core::ChangeSet;
/// use diffscope_report::scoping::scope_violations;
/// use diffscope_report::violation::parse_scan_results;
/// use std::path::Path;
///
/// let results = parse_scan_results(r#"[{"engine":"pmd","fileName":"/repo/src/A.cls","violations":[
///     {"line":3,"severity":1,"ruleName":"r","message":"m"},
///     {"line":30,"severity":1,"ruleName":"r","message":"m"}]}]"#).unwrap();
///
/// let mut changes = ChangeSet::new();
/// changes.record("src/A.cls", [3]);
///
/// let scoped = scope_violations(&results, &changes, Path::new("/repo"));
/// assert_eq!(scoped.len(), 1);
/// assert_eq!(scoped[0].violation.line, 3);
/// ```
pub fn scope_violations(
    results: &[ScanResult],
    changes: &ChangeSet,
    repo_root: &Path,
) -> Vec<ScopedViolation> {
    let mut scoped = Vec::new();
    let mut dropped = 0usize;

    for result in results {
        let path = repo_relative(&result.file_name, repo_root);
        for violation in &result.violations {
            if changes.contains_any(&path, violation.line, violation.last_line()) {
                scoped.push(ScopedViolation {
                    path: path.clone(),
                    engine: result.engine.clone(),
                    violation: violation.clone(),
                });
            } else {
                dropped += 1;
            }
        }
    }

    debug!(kept = scoped.len(), dropped, "scoped findings to changed lines");
    scoped
}

/// Express a scanner path relative to `repo_root`, dropping `./` segments.
fn repo_relative(path: &Path, repo_root: &Path) -> PathBuf {
    let relative = if path.is_absolute() {
        path.strip_prefix(repo_root)
            .ok()
            .map(Path::to_path_buf)
            .or_else(|| {
                let root = repo_root.canonicalize().ok()?;
                let path = path.canonicalize().ok()?;
                path.strip_prefix(root).ok().map(Path::to_path_buf)
            })
            .unwrap_or_else(|| path.to_path_buf())
    } else {
        path.to_path_buf()
    };

    relative
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::parse_scan_results;

    fn changes() -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.record("classes/A.cls", [7, 8, 9]);
        changes.record("lwc/banner.js", [1]);
        changes
    }

    fn results(json: &str) -> Vec<ScanResult> {
        parse_scan_results(json).unwrap()
    }

    #[test]
    fn range_overlapping_changed_lines_is_kept() {
        let results = results(
            r#"[{"engine":"pmd","fileName":"classes/A.cls","violations":[
                {"line":5,"endLine":7,"severity":2,"ruleName":"r","message":"overlaps"},
                {"line":10,"endLine":12,"severity":2,"ruleName":"r","message":"after"},
                {"line":1,"endLine":6,"severity":2,"ruleName":"r","message":"before"}]}]"#,
        );
        let scoped = scope_violations(&results, &changes(), Path::new("/repo"));
        let messages: Vec<_> = scoped.iter().map(|s| s.violation.message.as_str()).collect();
        assert_eq!(messages, vec!["overlaps"]);
    }

    #[test]
    fn untouched_files_are_dropped() {
        let results = results(
            r#"[{"engine":"pmd","fileName":"classes/B.cls","violations":[
                {"line":7,"severity":1,"ruleName":"r","message":"m"}]}]"#,
        );
        assert!(scope_violations(&results, &changes(), Path::new("/repo")).is_empty());
    }

    #[test]
    fn absolute_and_dotted_paths_are_normalized() {
        let results = results(
            r#"[{"engine":"pmd","fileName":"/repo/classes/A.cls","violations":[
                {"line":8,"severity":1,"ruleName":"r","message":"m"}]},
               {"engine":"eslint","fileName":"./lwc/banner.js","violations":[
                {"line":1,"severity":2,"ruleName":"no-var","message":"m"}]}]"#,
        );
        let scoped = scope_violations(&results, &changes(), Path::new("/repo"));
        assert_eq!(scoped.len(), 2);
        assert_eq!(scoped[0].path, PathBuf::from("classes/A.cls"));
        assert_eq!(scoped[1].path, PathBuf::from("lwc/banner.js"));
        assert_eq!(scoped[1].engine, "eslint");
    }

    #[test]
    fn end_line_at_u32_max_is_matched_against_recorded_lines() {
        let results = results(
            r#"[{"engine":"pmd","fileName":"lwc/banner.js","violations":[
                {"line":1,"endLine":4294967295,"severity":2,"ruleName":"r","message":"whole file"}]},
               {"engine":"pmd","fileName":"classes/A.cls","violations":[
                {"line":10,"endLine":"4294967295","severity":2,"ruleName":"r","message":"tail"}]}]"#,
        );
        let scoped = scope_violations(&results, &changes(), Path::new("/repo"));
        let messages: Vec<_> = scoped.iter().map(|s| s.violation.message.as_str()).collect();
        assert_eq!(messages, vec!["whole file"]);
    }

    #[test]
    fn empty_change_set_scopes_everything_out() {
        let results = results(
            r#"[{"engine":"pmd","fileName":"classes/A.cls","violations":[
                {"line":8,"severity":1,"ruleName":"r","message":"m"}]}]"#,
        );
        assert!(scope_violations(&results, &ChangeSet::new(), Path::new("/repo")).is_empty());
    }
}
