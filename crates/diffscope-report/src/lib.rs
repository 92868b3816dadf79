//! Scanner findings scoped to changed lines, and their publication to GitHub.
//!
//! The flow is [`violation::load_scan_results`] ->
//! [`scoping::scope_violations`] -> [`comment::build_comments`] ->
//! [`github::GitHubClient::publish`].
pub mod comment;
pub mod github;
pub mod scoping;
pub mod violation;

pub use comment::{build_comments, has_halting_error, ReportComment, ViolationKind};
pub use scoping::{scope_violations, ScopedViolation};
pub use violation::{load_scan_results, ScanResult, Violation};
