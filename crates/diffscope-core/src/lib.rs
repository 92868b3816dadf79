//! Core types, configuration, and error handling for diffscope.
//!
//! This crate provides the shared foundation used by all other diffscope crates:
//! - [`DiffScopeError`]: unified error type using `thiserror`
//! - [`DiffScopeConfig`]: configuration loaded from `.diffscope.toml`
//! - [`DiffTool`]: the version-control seam change sets are computed through
//! - Shared types: [`ChangeSet`], [`DiffHunk`], [`LineChange`], [`RefSelection`],
//!   [`OutputFormat`]

mod config;
mod error;
mod tool;
mod types;

pub use config::{DiffScopeConfig, GitConfig, ReportConfig, ReportStrategy, ScopeConfig};
pub use error::DiffScopeError;
pub use tool::DiffTool;
pub use types::{
    ChangeSet, ChangeType, DiffHunk, LineChange, OutputFormat, RefSelection, DEV_NULL,
};

/// A convenience `Result` type for diffscope operations.
pub type Result<T> = std::result::Result<T, DiffScopeError>;
