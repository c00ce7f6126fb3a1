//! Repository layer: one operation per user command.
//!
//! Commands run against a [`RepositoryContext`] built once per invocation.
//! Preconditions are checked before the first write; a failed check leaves
//! the store, refs and working tree untouched.

mod api;
mod config;
mod context;
mod error;
mod history;
mod merge;
mod status;

pub use api::Repository;
pub use config::RepositoryConfig;
pub use context::RepositoryContext;
pub use error::{RepoError, RepoResult};
pub use history::{LogEntry, DATE_FORMAT};
pub use merge::{classify, conflict_content, MergeAction, MergeOutcome};
pub use status::{Modification, Status};
