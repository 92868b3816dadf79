//! Diff parsing and changed-line scoping.
//!
//! Parses unified diffs into typed line records and reduces them to a
//! [`diffscope_core::ChangeSet`]: the lines a pull request added or removed,
//! per file.
pub mod filter;
pub mod parser;
pub mod scope;

pub use scope::{changed_lines_from_diff, compute_changed_lines, DiffScope};
