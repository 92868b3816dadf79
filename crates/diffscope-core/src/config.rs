use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DiffScopeError;

/// Top-level configuration loaded from `.diffscope.toml`.
///
/// Every section is optional; missing keys fall back to their defaults.
///
/// # Examples
///
/// ```
/// use diffscope_core::DiffScopeConfig;
///
/// let config = DiffScopeConfig::default();
/// assert_eq!(config.git.origin_remote, "origin");
/// assert_eq!(config.report.severity_threshold, 4);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffScopeConfig {
    /// Remote names and diff options.
    #[serde(default)]
    pub git: GitConfig,
    /// Files excluded from the change set.
    #[serde(default)]
    pub scope: ScopeConfig,
    /// How scoped findings are published.
    #[serde(default)]
    pub report: ReportConfig,
}

impl DiffScopeConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::Io`] if the file cannot be read, or
    /// [`DiffScopeError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use diffscope_core::DiffScopeConfig;
    /// use std::path::Path;
    ///
    /// let config = DiffScopeConfig::from_file(Path::new(".diffscope.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, DiffScopeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscope_core::DiffScopeConfig;
    ///
    /// let toml = r#"
    /// [git]
    /// destination_remote = "fork"
    /// "#;
    /// let config = DiffScopeConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.git.destination_remote, "fork");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DiffScopeError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Remote naming and diff generation options.
///
/// # Examples
///
/// ```
/// use diffscope_core::GitConfig;
///
/// let config = GitConfig::default();
/// assert_eq!(config.destination_remote, "destination");
/// assert!(config.detect_renames);
/// assert_eq!(config.context_lines, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Remote the base ref is resolved against (default: `"origin"`).
    #[serde(default = "default_origin_remote")]
    pub origin_remote: String,
    /// Remote name a `--remote-url` is registered under (default: `"destination"`).
    #[serde(default = "default_destination_remote")]
    pub destination_remote: String,
    /// Report renamed files under their new path (default: true).
    #[serde(default = "default_true")]
    pub detect_renames: bool,
    /// Context lines around each hunk (default: 3).
    #[serde(default = "default_context_lines")]
    pub context_lines: u32,
}

fn default_origin_remote() -> String {
    "origin".into()
}

fn default_destination_remote() -> String {
    "destination".into()
}

fn default_true() -> bool {
    true
}

fn default_context_lines() -> u32 {
    3
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            origin_remote: default_origin_remote(),
            destination_remote: default_destination_remote(),
            detect_renames: true,
            context_lines: default_context_lines(),
        }
    }
}

/// Files removed from the change set before reporting.
///
/// # Examples
///
/// ```
/// use diffscope_core::ScopeConfig;
///
/// let config = ScopeConfig::default();
/// assert!(config.skip_defaults);
/// assert!(config.skip_patterns.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Glob patterns of files to ignore.
    #[serde(default)]
    pub skip_patterns: Vec<String>,
    /// File extensions to ignore, without the leading dot.
    #[serde(default)]
    pub skip_extensions: Vec<String>,
    /// Also skip lock files and vendored directories (default: true).
    #[serde(default = "default_true")]
    pub skip_defaults: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            skip_patterns: Vec::new(),
            skip_extensions: Vec::new(),
            skip_defaults: true,
        }
    }
}

/// Publishing configuration.
///
/// # Examples
///
/// ```
/// use diffscope_core::{ReportConfig, ReportStrategy};
///
/// let config = ReportConfig::default();
/// assert_eq!(config.strategy, ReportStrategy::Review);
/// assert_eq!(config.check_name, "diffscope");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Where findings are posted (default: `review`).
    #[serde(default)]
    pub strategy: ReportStrategy,
    /// Scanner severities at or below this value fail the run (default: 4).
    #[serde(default = "default_severity_threshold")]
    pub severity_threshold: u8,
    /// Name of the check run for the `check` strategy.
    #[serde(default = "default_check_name")]
    pub check_name: String,
}

fn default_severity_threshold() -> u8 {
    4
}

fn default_check_name() -> String {
    "diffscope".into()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            strategy: ReportStrategy::default(),
            severity_threshold: default_severity_threshold(),
            check_name: default_check_name(),
        }
    }
}

/// How scoped findings are published to the hosting service.
///
/// # Examples
///
/// ```
/// use diffscope_core::ReportStrategy;
///
/// let s: ReportStrategy = "commit".parse().unwrap();
/// assert_eq!(s, ReportStrategy::CommitComments);
/// assert_eq!(ReportStrategy::CheckRun.to_string(), "check");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStrategy {
    /// One pull request review holding every comment.
    #[default]
    #[serde(rename = "review")]
    Review,
    /// One commit comment per finding.
    #[serde(rename = "commit")]
    CommitComments,
    /// A completed check run with one annotation per finding.
    #[serde(rename = "check")]
    CheckRun,
}

impl fmt::Display for ReportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStrategy::Review => write!(f, "review"),
            ReportStrategy::CommitComments => write!(f, "commit"),
            ReportStrategy::CheckRun => write!(f, "check"),
        }
    }
}

impl FromStr for ReportStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "review" => Ok(ReportStrategy::Review),
            "commit" | "commit-comments" => Ok(ReportStrategy::CommitComments),
            "check" | "check-run" => Ok(ReportStrategy::CheckRun),
            other => Err(format!("unknown report strategy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = DiffScopeConfig::default();
        assert_eq!(config.git.origin_remote, "origin");
        assert_eq!(config.git.destination_remote, "destination");
        assert!(config.git.detect_renames);
        assert_eq!(config.git.context_lines, 3);
        assert!(config.scope.skip_defaults);
        assert!(config.scope.skip_extensions.is_empty());
        assert_eq!(config.report.strategy, ReportStrategy::Review);
        assert_eq!(config.report.severity_threshold, 4);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[git]
origin_remote = "upstream"
destination_remote = "fork"
detect_renames = false
context_lines = 0

[scope]
skip_patterns = ["fixtures/**"]
skip_extensions = ["snap"]
skip_defaults = false

[report]
strategy = "check"
severity_threshold = 2
check_name = "apex-scan"
"#;
        let config = DiffScopeConfig::from_toml(toml).unwrap();
        assert_eq!(config.git.origin_remote, "upstream");
        assert_eq!(config.git.destination_remote, "fork");
        assert!(!config.git.detect_renames);
        assert_eq!(config.git.context_lines, 0);
        assert_eq!(config.scope.skip_patterns, vec!["fixtures/**"]);
        assert_eq!(config.scope.skip_extensions, vec!["snap"]);
        assert!(!config.scope.skip_defaults);
        assert_eq!(config.report.strategy, ReportStrategy::CheckRun);
        assert_eq!(config.report.severity_threshold, 2);
        assert_eq!(config.report.check_name, "apex-scan");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = DiffScopeConfig::from_toml("").unwrap();
        assert_eq!(config.git.origin_remote, "origin");
        assert_eq!(config.report.strategy, ReportStrategy::Review);
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = DiffScopeConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(DiffScopeConfig::from_toml("[report]\nstrategy = \"email\"").is_err());
        assert!("email".parse::<ReportStrategy>().is_err());
    }
}
