//! Scanner result model.
//!
//! Scanners emit a JSON list with one entry per file. Line and column fields
//! arrive either as numbers or as numeric strings depending on the engine, so
//! both forms are accepted.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use diffscope_core::DiffScopeError;
use serde::{Deserialize, Deserializer, Serialize};

/// Findings for a single file, as reported by one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub engine: String,
    pub file_name: PathBuf,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

/// One finding.
///
/// # Examples
///
/// ```
/// use diffscope_report::violation::Violation;
///
/// let v: Violation = serde_json::from_str(
///     r#"{"line": "12", "endLine": 14, "severity": 2, "ruleName": "ApexDoc", "message": "missing docs"}"#,
/// ).unwrap();
/// assert_eq!(v.line, 12);
/// assert_eq!(v.end_line, Some(14));
/// assert_eq!(v.last_line(), 14);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    #[serde(deserialize_with = "number_or_string")]
    pub line: u32,
    #[serde(
        default,
        deserialize_with = "optional_number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_line: Option<u32>,
    #[serde(
        default,
        deserialize_with = "optional_number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub column: Option<u32>,
    #[serde(
        default,
        deserialize_with = "optional_number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_column: Option<u32>,
    /// 1 is the most severe.
    #[serde(deserialize_with = "number_or_string")]
    pub severity: u8,
    pub rule_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub message: String,
}

impl Violation {
    /// Last line the finding covers; `line` when no end line was reported.
    pub fn last_line(&self) -> u32 {
        self.end_line.unwrap_or(self.line).max(self.line)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    Text(String),
}

impl<T> NumberOrString<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn into_number<E: serde::de::Error>(self) -> Result<T, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| E::custom(format!("invalid number '{s}': {e}"))),
        }
    }
}

fn number_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    NumberOrString::<T>::deserialize(deserializer)?.into_number()
}

fn optional_number_or_string<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    Option::<NumberOrString<T>>::deserialize(deserializer)?
        .map(NumberOrString::into_number)
        .transpose()
}

/// Parse scanner output.
///
/// # Errors
///
/// Returns [`DiffScopeError::Serialization`] if the JSON does not match the
/// scanner result format.
pub fn parse_scan_results(json: &str) -> Result<Vec<ScanResult>, DiffScopeError> {
    Ok(serde_json::from_str(json)?)
}

/// Load scanner output from `path`.
///
/// # Errors
///
/// Returns [`DiffScopeError::FileNotFound`] if `path` does not exist, and
/// the errors of [`parse_scan_results`] otherwise.
pub fn load_scan_results(path: &Path) -> Result<Vec<ScanResult>, DiffScopeError> {
    if !path.exists() {
        return Err(DiffScopeError::FileNotFound(path.to_path_buf()));
    }
    let json = std::fs::read_to_string(path)?;
    parse_scan_results(&json)
}
