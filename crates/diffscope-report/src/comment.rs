//! Turn scoped findings into comments ready to post.

use std::fmt;

use serde::Serialize;

use crate::scoping::ScopedViolation;

/// Whether a finding fails the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    Error,
    Warning,
}

impl ViolationKind {
    /// Severities at or below `threshold` are errors. Severity 1 is the most
    /// severe.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscope_report::comment::ViolationKind;
    ///
    /// assert_eq!(ViolationKind::classify(1, 2), ViolationKind::Error);
    /// assert_eq!(ViolationKind::classify(2, 2), ViolationKind::Error);
    /// assert_eq!(ViolationKind::classify(3, 2), ViolationKind::Warning);
    /// ```
    pub fn classify(severity: u8, threshold: u8) -> Self {
        if severity <= threshold {
            ViolationKind::Error
        } else {
            ViolationKind::Warning
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Error => write!(f, "Error"),
            ViolationKind::Warning => write!(f, "Warning"),
        }
    }
}

/// A comment anchored to a line range of a changed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportComment {
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub kind: ViolationKind,
    pub rule: String,
    pub body: String,
}

/// Build one comment per scoped finding, in input order.
pub fn build_comments(scoped: &[ScopedViolation], severity_threshold: u8) -> Vec<ReportComment> {
    scoped
        .iter()
        .map(|s| {
            let v = &s.violation;
            let kind = ViolationKind::classify(v.severity, severity_threshold);
            let message = v.message.trim();
            let message = match &v.url {
                Some(url) => format!("[{message}]({url})"),
                None => message.to_string(),
            };
            let category = if v.category.is_empty() {
                String::new()
            } else {
                format!(", {}", v.category)
            };
            ReportComment {
                path: s.path.to_string_lossy().replace('\\', "/"),
                start_line: v.line,
                end_line: v.last_line(),
                kind,
                rule: v.rule_name.clone(),
                body: format!(
                    "**{kind}** `{}/{}` (severity {}{category}): {message}",
                    s.engine, v.rule_name, v.severity
                ),
            }
        })
        .collect()
}

/// Returns `true` if any comment is an error.
pub fn has_halting_error(comments: &[ReportComment]) -> bool {
    comments.iter().any(|c| c.kind == ViolationKind::Error)
}

/// One-line tally for review and check run summaries.
///
/// # Examples
///
/// ```
/// use diffscope_report::comment::summarize;
///
/// assert_eq!(summarize(&[]), "diffscope: no findings on changed lines");
/// ```
pub fn summarize(comments: &[ReportComment]) -> String {
    if comments.is_empty() {
        return "diffscope: no findings on changed lines".into();
    }
    let errors = comments
        .iter()
        .filter(|c| c.kind == ViolationKind::Error)
        .count();
    let warnings = comments.len() - errors;
    format!("diffscope: {errors} error(s), {warnings} warning(s) on changed lines")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::Violation;
    use std::path::PathBuf;

    fn scoped(severity: u8, end_line: Option<u32>, url: Option<&str>) -> ScopedViolation {
        ScopedViolation {
            path: PathBuf::from("classes/A.cls"),
            engine: "pmd".into(),
            violation: Violation {
                line: 7,
                end_line,
                column: None,
                end_column: None,
                severity,
                rule_name: "ApexCRUDViolation".into(),
                category: "Security".into(),
                url: url.map(String::from),
                message: " Validate CRUD permission ".into(),
            },
        }
    }

    #[test]
    fn comment_carries_range_and_body() {
        let comments = build_comments(
            &[scoped(1, Some(9), Some("https://pmd.github.io/crud"))],
            4,
        );
        let c = &comments[0];
        assert_eq!(c.path, "classes/A.cls");
        assert_eq!((c.start_line, c.end_line), (7, 9));
        assert_eq!(c.kind, ViolationKind::Error);
        assert_eq!(
            c.body,
            "**Error** `pmd/ApexCRUDViolation` (severity 1, Security): \
             [Validate CRUD permission](https://pmd.github.io/crud)"
        );
    }

    #[test]
    fn single_line_finding_ends_where_it_starts() {
        let comments = build_comments(&[scoped(5, None, None)], 4);
        assert_eq!((comments[0].start_line, comments[0].end_line), (7, 7));
        assert_eq!(comments[0].kind, ViolationKind::Warning);
        assert!(comments[0].body.ends_with(": Validate CRUD permission"));
    }

    #[test]
    fn halting_error_follows_threshold() {
        let scoped = [scoped(3, None, None)];
        assert!(has_halting_error(&build_comments(&scoped, 3)));
        assert!(!has_halting_error(&build_comments(&scoped, 2)));
        assert!(!has_halting_error(&[]));
    }

    #[test]
    fn summary_counts_kinds() {
        let comments = build_comments(&[scoped(1, None, None), scoped(5, None, None)], 4);
        assert_eq!(
            summarize(&comments),
            "diffscope: 1 error(s), 1 warning(s) on changed lines"
        );
    }

    #[test]
    fn comments_serialize_with_lowercase_kind() {
        let comments = build_comments(&[scoped(1, None, None)], 4);
        let json = serde_json::to_value(&comments[0]).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["start_line"], 7);
    }
}
