use crate::error::DiffScopeError;
use crate::types::RefSelection;

/// The version-control operations a change-set computation needs.
///
/// Implementations are constructed by the caller against one working
/// directory and passed in explicitly. Calls run to completion on the
/// calling thread; callers must not run two computations against the same
/// working directory at once.
pub trait DiffTool {
    /// Register `url` under the remote `name`, repointing an existing remote
    /// of that name.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::RemoteRegistration`] for an invalid URL.
    fn register_remote(&self, name: &str, url: &str) -> Result<(), DiffScopeError>;

    /// Fetch the refs of remote `name` so they resolve locally.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::RemoteRegistration`] if the remote is unknown
    /// or unreachable.
    fn update_remote(&self, name: &str) -> Result<(), DiffScopeError>;

    /// Produce a unified diff for already remote-qualified refs.
    ///
    /// # Errors
    ///
    /// Returns [`DiffScopeError::RefResolution`] for an unknown ref and
    /// [`DiffScopeError::Git`] for any other failure.
    fn diff(&self, refs: &RefSelection) -> Result<String, DiffScopeError>;
}

impl<T: DiffTool + ?Sized> DiffTool for &T {
    fn register_remote(&self, name: &str, url: &str) -> Result<(), DiffScopeError> {
        (**self).register_remote(name, url)
    }

    fn update_remote(&self, name: &str) -> Result<(), DiffScopeError> {
        (**self).update_remote(name)
    }

    fn diff(&self, refs: &RefSelection) -> Result<String, DiffScopeError> {
        (**self).diff(refs)
    }
}
