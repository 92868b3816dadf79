//! Git-backed [`diffscope_core::DiffTool`] built on libgit2.
pub mod repository;

pub use repository::GitRepository;
