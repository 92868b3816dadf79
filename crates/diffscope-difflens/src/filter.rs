//! Path filtering applied to a change set before findings are matched.
//!
//! Lock files and vendored dependencies are skipped by default, together
//! with any glob patterns or extensions from the `[scope]` configuration.

use std::path::{Path, PathBuf};

use diffscope_core::{ChangeSet, ScopeConfig};
use tracing::{debug, warn};

/// Files to drop from a change set.
///
/// # Examples
///
/// ```
/// use diffscope_difflens::filter::PathFilter;
///
/// let filter = PathFilter::default_filter();
/// assert!(filter.should_skip("package-lock.json"));
/// assert!(!filter.should_skip("src/main.rs"));
/// ```
pub struct PathFilter {
    skip_patterns: Vec<glob::Pattern>,
    skip_extensions: Vec<String>,
    skip_defaults: bool,
}

impl PathFilter {
    /// Create a filter that only applies the built-in lock file and vendored
    /// directory rules.
    pub fn default_filter() -> Self {
        Self {
            skip_patterns: Vec::new(),
            skip_extensions: Vec::new(),
            skip_defaults: true,
        }
    }

    /// Create a filter from scope configuration. Invalid glob patterns are
    /// ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscope_core::ScopeConfig;
    /// use diffscope_difflens::filter::PathFilter;
    ///
    /// let config = ScopeConfig {
    ///     skip_patterns: vec!["fixtures/**".into()],
    ///     ..ScopeConfig::default()
    /// };
    /// let filter = PathFilter::from_config(&config);
    /// assert!(filter.should_skip("fixtures/data/a.cls"));
    /// assert!(filter.should_skip("Cargo.lock"));
    /// ```
    pub fn from_config(config: &ScopeConfig) -> Self {
        let mut skip_patterns = Vec::new();
        for pat in &config.skip_patterns {
            match glob::Pattern::new(pat) {
                Ok(p) => skip_patterns.push(p),
                Err(e) => warn!(pattern = %pat, "ignoring invalid skip pattern: {e}"),
            }
        }

        Self {
            skip_patterns,
            skip_extensions: config.skip_extensions.clone(),
            skip_defaults: config.skip_defaults,
        }
    }

    /// Check if a single file path should be skipped.
    pub fn should_skip(&self, path: &str) -> bool {
        self.check_skip(Path::new(path)).is_some()
    }

    /// Remove skipped files from `changes`, reporting each removal.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscope_core::ChangeSet;
    /// use diffscope_difflens::filter::PathFilter;
    ///
    /// let mut changes = ChangeSet::new();
    /// changes.record("src/main.rs", [1]);
    /// changes.record("vendor/lib.go", [3]);
    ///
    /// let result = PathFilter::default_filter().filter(changes);
    /// assert_eq!(result.kept.len(), 1);
    /// assert_eq!(result.skipped.len(), 1);
    /// ```
    pub fn filter(&self, mut changes: ChangeSet) -> FilterResult {
        let mut skipped = Vec::new();

        changes.retain_files(|path| match self.check_skip(path) {
            Some(reason) => {
                debug!(path = %path.display(), %reason, "skipping file");
                skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason,
                });
                false
            }
            None => true,
        });

        skipped.sort_by(|a, b| a.path.cmp(&b.path));
        FilterResult {
            kept: changes,
            skipped,
        }
    }

    fn check_skip(&self, path: &Path) -> Option<SkipReason> {
        let path_str = path.to_string_lossy();
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();

        if self.skip_defaults {
            if is_lock_file(&file_name) {
                return Some(SkipReason::LockFile);
            }
            if is_vendored(&path_str) {
                return Some(SkipReason::VendoredCode);
            }
        }

        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            for skip_ext in &self.skip_extensions {
                if ext == skip_ext.trim_start_matches('.') {
                    return Some(SkipReason::PatternMatch(format!("*.{ext}")));
                }
            }
        }

        self.skip_patterns
            .iter()
            .find(|pat| pat.matches(&path_str))
            .map(|pat| SkipReason::PatternMatch(pat.to_string()))
    }
}

/// Result of filtering a change set.
#[derive(Debug)]
pub struct FilterResult {
    /// Files that passed the filter.
    pub kept: ChangeSet,
    /// Files that were dropped, ordered by path.
    pub skipped: Vec<SkippedFile>,
}

/// A file that was skipped during filtering.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    /// Path of the skipped file.
    pub path: PathBuf,
    /// Why the file was skipped.
    pub reason: SkipReason,
}

/// Reason a file was skipped.
///
/// # Examples
///
/// ```
/// use diffscope_difflens::filter::SkipReason;
///
/// let reason = SkipReason::LockFile;
/// assert_eq!(format!("{reason}"), "lock file");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Package manager lock file.
    LockFile,
    /// Third-party vendored code.
    VendoredCode,
    /// Matched a custom skip pattern or extension.
    PatternMatch(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::LockFile => write!(f, "lock file"),
            SkipReason::VendoredCode => write!(f, "vendored code"),
            SkipReason::PatternMatch(pat) => write!(f, "pattern: {pat}"),
        }
    }
}

const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "Cargo.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
];

fn is_lock_file(file_name: &str) -> bool {
    LOCK_FILES.contains(&file_name)
}

fn is_vendored(path: &str) -> bool {
    path.split('/')
        .any(|part| part == "vendor" || part == "third_party" || part == "node_modules")
}
