use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DiffScopeError;

/// Path used by unified diffs for the missing side of an added or deleted file.
pub const DEV_NULL: &str = "/dev/null";

/// A single line record inside a diff hunk.
///
/// Additions carry their line number in the post-change file, deletions the
/// line number in the pre-change file, as reported by the hunk itself.
///
/// # Examples
///
/// ```
/// use diffscope_core::LineChange;
///
/// assert_eq!(LineChange::Add { line: 10 }.changed_line(), Some(10));
/// assert_eq!(LineChange::Delete { line: 4 }.changed_line(), Some(4));
/// assert_eq!(LineChange::Context { old_line: 3, new_line: 5 }.changed_line(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LineChange {
    /// A line introduced by the change.
    Add { line: u32 },
    /// A line removed by the change.
    Delete { line: u32 },
    /// An unchanged line shown for context.
    #[serde(rename_all = "camelCase")]
    Context { old_line: u32, new_line: u32 },
}

impl LineChange {
    /// The line number this record contributes to a [`ChangeSet`], if any.
    pub fn changed_line(&self) -> Option<u32> {
        match *self {
            LineChange::Add { line } | LineChange::Delete { line } => Some(line),
            LineChange::Context { .. } => None,
        }
    }
}

/// A single hunk from a unified diff.
///
/// # Examples
///
/// ```
/// use diffscope_core::{ChangeType, DiffHunk, LineChange};
/// use std::path::PathBuf;
///
/// let hunk = DiffHunk {
///     file_path: PathBuf::from("src/lib.rs"),
///     old_start: 10,
///     old_lines: 1,
///     new_start: 10,
///     new_lines: 1,
///     changes: vec![LineChange::Delete { line: 10 }, LineChange::Add { line: 10 }],
///     change_type: ChangeType::Modify,
/// };
/// assert_eq!(hunk.changed_lines().count(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffHunk {
    /// Path to the affected file.
    pub file_path: PathBuf,
    /// Starting line in the old version.
    pub old_start: u32,
    /// Number of lines in the old version.
    pub old_lines: u32,
    /// Starting line in the new version.
    pub new_start: u32,
    /// Number of lines in the new version.
    pub new_lines: u32,
    /// Line records in diff order.
    pub changes: Vec<LineChange>,
    /// Classification of the change.
    pub change_type: ChangeType,
}

impl DiffHunk {
    /// Line numbers of every addition and deletion in this hunk.
    pub fn changed_lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.changes.iter().filter_map(LineChange::changed_line)
    }
}

/// Classification of a diff hunk.
///
/// # Examples
///
/// ```
/// use diffscope_core::ChangeType;
///
/// let ct = ChangeType::Add;
/// assert_eq!(format!("{ct}"), "add");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// New file or code added.
    Add,
    /// Existing file or code removed.
    Delete,
    /// Existing code modified in place.
    Modify,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Add => write!(f, "add"),
            ChangeType::Delete => write!(f, "delete"),
            ChangeType::Modify => write!(f, "modify"),
        }
    }
}

/// Changed line numbers per file, keyed by post-change path.
///
/// A path is only ever present with a non-empty set; recording an empty set
/// is a no-op. Iteration order is unspecified, use [`ChangeSet::to_sorted`]
/// for stable output.
///
/// # Examples
///
/// ```
/// use diffscope_core::ChangeSet;
/// use std::path::Path;
///
/// let mut changes = ChangeSet::new();
/// changes.record("src/a.ts", [10, 4]);
/// changes.record("src/empty.ts", []);
///
/// assert!(changes.contains(Path::new("src/a.ts"), 4));
/// assert!(!changes.contains(Path::new("src/a.ts"), 5));
/// assert_eq!(changes.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    files: HashMap<PathBuf, HashSet<u32>>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `lines` to the set recorded for `path`, merging with any lines
    /// already present. Empty input leaves the change set untouched.
    pub fn record<P, I>(&mut self, path: P, lines: I)
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = u32>,
    {
        let mut lines = lines.into_iter().peekable();
        if lines.peek().is_none() {
            return;
        }
        self.files.entry(path.into()).or_default().extend(lines);
    }

    /// Returns `true` if `line` of `path` was added or removed.
    pub fn contains(&self, path: &Path, line: u32) -> bool {
        self.files.get(path).is_some_and(|lines| lines.contains(&line))
    }

    /// Returns `true` if any line in `start..=end` of `path` changed.
    pub fn contains_any(&self, path: &Path, start: u32, end: u32) -> bool {
        let Some(lines) = self.files.get(path) else {
            return false;
        };
        let range = start..=end.max(start);
        lines.iter().any(|line| range.contains(line))
    }

    /// The changed lines recorded for `path`.
    pub fn lines(&self, path: &Path) -> Option<&HashSet<u32>> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &HashSet<u32>)> {
        self.files.iter().map(|(path, lines)| (path.as_path(), lines))
    }

    /// Drop every file for which `keep` returns `false`.
    pub fn retain_files<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Path) -> bool,
    {
        self.files.retain(|path, _| keep(path));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total number of changed lines across all files.
    pub fn line_count(&self) -> usize {
        self.files.values().map(HashSet::len).sum()
    }

    /// A path-and-line ordered copy, for display and serialization.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscope_core::ChangeSet;
    ///
    /// let mut changes = ChangeSet::new();
    /// changes.record("b.rs", [3, 1]);
    /// changes.record("a.rs", [2]);
    ///
    /// let sorted = changes.to_sorted();
    /// let keys: Vec<_> = sorted.keys().cloned().collect();
    /// assert_eq!(keys, vec!["a.rs".to_string(), "b.rs".to_string()]);
    /// assert_eq!(sorted["b.rs"].iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    /// ```
    pub fn to_sorted(&self) -> BTreeMap<String, BTreeSet<u32>> {
        self.files
            .iter()
            .map(|(path, lines)| {
                (
                    path.to_string_lossy().into_owned(),
                    lines.iter().copied().collect(),
                )
            })
            .collect()
    }
}

/// Which refs a diff compares.
///
/// Built from a loose list of ref names with blank entries removed: one ref
/// compares the working tree against it, two refs compare base against target.
///
/// # Examples
///
/// ```
/// use diffscope_core::RefSelection;
///
/// let sel = RefSelection::from_refs(&["main", "", "feature"]).unwrap().unwrap();
/// assert_eq!(
///     sel,
///     RefSelection::Pair { base: "main".into(), target: "feature".into() }
/// );
///
/// assert!(RefSelection::from_refs::<&str>(&[]).unwrap().is_none());
/// assert!(RefSelection::from_refs(&["", "  "]).unwrap().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefSelection {
    /// Working tree against a single ref.
    Single(String),
    /// Base ref against target ref.
    Pair { base: String, target: String },
}

impl RefSelection {
    /// Build a selection from raw ref names, skipping blank entries.
    ///
    /// Returns `Ok(None)` when no ref remains.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::Config`] if more than two refs remain.
    pub fn from_refs<S: AsRef<str>>(refs: &[S]) -> Result<Option<Self>, DiffScopeError> {
        let refs: Vec<&str> = refs
            .iter()
            .map(|r| r.as_ref().trim())
            .filter(|r| !r.is_empty())
            .collect();

        match refs.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(RefSelection::Single((*single).to_string()))),
            [base, target] => Ok(Some(RefSelection::Pair {
                base: (*base).to_string(),
                target: (*target).to_string(),
            })),
            _ => Err(DiffScopeError::Config(format!(
                "expected at most two refs, got {}: {}",
                refs.len(),
                refs.join(", ")
            ))),
        }
    }

    /// Prefix each ref with the remote it is resolved against: the base (or
    /// single) ref with `base_remote`, the target with `target_remote`.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscope_core::RefSelection;
    ///
    /// let sel = RefSelection::Pair { base: "main".into(), target: "feature".into() };
    /// assert_eq!(
    ///     sel.qualified("origin", "destination").refs(),
    ///     vec!["origin/main", "destination/feature"]
    /// );
    /// ```
    pub fn qualified(&self, base_remote: &str, target_remote: &str) -> Self {
        match self {
            RefSelection::Single(r) => RefSelection::Single(format!("{base_remote}/{r}")),
            RefSelection::Pair { base, target } => RefSelection::Pair {
                base: format!("{base_remote}/{base}"),
                target: format!("{target_remote}/{target}"),
            },
        }
    }

    /// The refs in diff order.
    pub fn refs(&self) -> Vec<&str> {
        match self {
            RefSelection::Single(r) => vec![r.as_str()],
            RefSelection::Pair { base, target } => vec![base.as_str(), target.as_str()],
        }
    }
}

impl fmt::Display for RefSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefSelection::Single(r) => write!(f, "{r} (working tree)"),
            RefSelection::Pair { base, target } => write!(f, "{base}...{target}"),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use diffscope_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_default_is_text() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn change_set_never_holds_empty_sets() {
        let mut changes = ChangeSet::new();
        changes.record("a.rs", Vec::new());
        assert!(changes.is_empty());
        assert!(changes.lines(Path::new("a.rs")).is_none());
    }

    #[test]
    fn contains_any_handles_unbounded_ranges() {
        let mut changes = ChangeSet::new();
        changes.record("a.rs", [7]);
        let path = Path::new("a.rs");
        assert!(changes.contains_any(path, 1, u32::MAX));
        assert!(!changes.contains_any(path, 8, u32::MAX));
        assert!(changes.contains_any(path, 7, 3));
        assert!(!changes.contains_any(path, 1, 6));
    }

    #[test]
    fn change_set_merges_repeated_paths() {
        let mut changes = ChangeSet::new();
        changes.record("a.rs", [1, 2]);
        changes.record("a.rs", [2, 3]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.line_count(), 3);
    }

    #[test]
    fn change_set_range_lookup() {
        let mut changes = ChangeSet::new();
        changes.record("a.rs", [7]);
        assert!(changes.contains_any(Path::new("a.rs"), 5, 8));
        assert!(!changes.contains_any(Path::new("a.rs"), 1, 6));
        // an inverted range degrades to its start line
        assert!(changes.contains_any(Path::new("a.rs"), 7, 2));
        assert!(!changes.contains_any(Path::new("b.rs"), 1, 100));
    }

    #[test]
    fn change_set_equality_ignores_insertion_order() {
        let mut a = ChangeSet::new();
        a.record("x.rs", [1, 2]);
        a.record("y.rs", [9]);
        let mut b = ChangeSet::new();
        b.record("y.rs", [9]);
        b.record("x.rs", [2, 1]);
        assert_eq!(a, b);
    }

    #[test]
    fn change_set_serializes_as_object() {
        let mut changes = ChangeSet::new();
        changes.record("src/a.ts", [4]);
        let json = serde_json::to_value(&changes).unwrap();
        assert_eq!(json["src/a.ts"], serde_json::json!([4]));
    }

    #[test]
    fn line_change_serializes_tagged() {
        let json = serde_json::to_value(LineChange::Context {
            old_line: 1,
            new_line: 2,
        })
        .unwrap();
        assert_eq!(json["type"], "context");
        assert_eq!(json["oldLine"], 1);
        assert_eq!(json["newLine"], 2);
    }

    #[test]
    fn ref_selection_rejects_three_refs() {
        let err = RefSelection::from_refs(&["a", "b", "c"]).unwrap_err();
        assert!(err.to_string().contains("at most two refs"));
    }

    #[test]
    fn single_ref_is_qualified_with_base_remote() {
        let sel = RefSelection::from_refs(&["", "main"]).unwrap().unwrap();
        assert_eq!(sel.qualified("origin", "destination").refs(), vec!["origin/main"]);
    }

    #[test]
    fn ref_selection_display() {
        let sel = RefSelection::Pair {
            base: "origin/main".into(),
            target: "origin/feature".into(),
        };
        assert_eq!(sel.to_string(), "origin/main...origin/feature");
    }
}
