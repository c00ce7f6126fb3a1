//! Repository-level errors.
//!
//! User errors render as the single line shown to the user; anything wrapped
//! from the storage layer is treated as fatal.

use thiserror::Error;

use crate::storage::{InvalidNameError, StorageError};

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("A Gitlet version-control system already exists in the current directory.")]
    AlreadyInitialized,

    #[error("Not in an initialized Gitlet directory.")]
    NotInitialized,

    #[error("File does not exist.")]
    FileNotFound,

    #[error("Please enter a commit message.")]
    EmptyMessage,

    #[error("No changes added to the commit.")]
    NothingToCommit,

    #[error("No reason to remove the file.")]
    NoReasonToRemove,

    #[error("Found no commit with that message.")]
    NoCommitWithMessage,

    #[error("No commit with that id exists.")]
    NoSuchCommit,

    #[error("File does not exist in that commit.")]
    FileNotInCommit,

    #[error("No such branch exists.")]
    NoSuchBranch,

    #[error("No need to checkout the current branch.")]
    AlreadyOnBranch,

    #[error("A branch with that name already exists.")]
    BranchExists,

    #[error("A branch with that name does not exist.")]
    BranchNotFound,

    #[error("Cannot remove the current branch.")]
    CannotRemoveCurrent,

    #[error("There is an untracked file in the way; delete it, or add and commit it first.")]
    UntrackedInTheWay,

    #[error("You have uncommitted changes.")]
    UncommittedChanges,

    #[error("Cannot merge a branch with itself.")]
    MergeWithSelf,

    #[error("Given branch is an ancestor of the current branch.")]
    GivenIsAncestor,

    #[error("Incorrect operands.")]
    IncorrectOperands,

    #[error("Invalid name: {0}.")]
    InvalidName(#[from] InvalidNameError),

    /// Missing or damaged repository state; not recoverable by the user.
    #[error("fatal: {0}")]
    Storage(#[from] StorageError),

    #[error("fatal: io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepoError {
    /// Precondition violations reported as one line with a non-fatal exit.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, RepoError::Storage(_) | RepoError::Io(_))
    }
}
