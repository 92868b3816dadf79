use std::path::PathBuf;

/// Errors that can occur across diffscope.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette::Report` at the boundary.
///
/// Ref resolution, remote registration and diff tool failures are fatal: the
/// operation that raised them returns no partial result.
///
/// # Examples
///
/// ```
/// use diffscope_core::DiffScopeError;
///
/// let err = DiffScopeError::RefResolution { refspec: "origin/nope".into() };
/// assert!(err.to_string().contains("origin/nope"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DiffScopeError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(diffscope::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(diffscope::config))]
    Config(String),

    /// The diff tool failed for a reason other than ref or remote resolution.
    #[error("git error: {0}")]
    #[diagnostic(code(diffscope::git))]
    Git(String),

    /// A ref could not be resolved in its remote.
    #[error("failed to resolve reference '{refspec}'")]
    #[diagnostic(
        code(diffscope::ref_resolution),
        help("make sure the branch exists and the remote has been fetched")
    )]
    RefResolution { refspec: String },

    /// A remote could not be registered or fetched.
    #[error("failed to register remote '{remote}' at '{url}': {reason}")]
    #[diagnostic(code(diffscope::remote_registration))]
    RemoteRegistration {
        remote: String,
        url: String,
        reason: String,
    },

    /// Input parsing failure.
    #[error("parse error: {0}")]
    #[diagnostic(code(diffscope::parse))]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(diffscope::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(diffscope::toml))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(diffscope::file_not_found))]
    FileNotFound(PathBuf),

    /// GitHub API failure.
    #[error("GitHub error: {0}")]
    #[diagnostic(code(diffscope::github))]
    GitHub(String),
}
