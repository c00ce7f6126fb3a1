//! Repository API - one method per user command.
//!
//! Every method checks all of its preconditions before the first write, so a
//! rejected command leaves the store, the refs and the working tree as they
//! were.

use tracing::{debug, info};

use super::config::RepositoryConfig;
use super::context::RepositoryContext;
use super::error::{RepoError, RepoResult};
use super::history::LogEntry;
use super::merge::{self, MergeOutcome};
use super::status::Status;
use crate::storage::{BlobId, Branch, BranchName, CommitBuilder, CommitId, StorageError};
use crate::worktree::WorkTree;

/// The main repository handle.
pub struct Repository {
    ctx: RepositoryContext,
}

impl Repository {
    /// Initialize a new repository in `config.work_dir`.
    pub fn init(config: RepositoryConfig) -> RepoResult<Self> {
        let ctx = RepositoryContext::init(config)?;
        info!(branch = %ctx.branch().name(), "initialized empty repository");
        Ok(Self { ctx })
    }

    /// Open an existing repository.
    pub fn open(config: RepositoryConfig) -> RepoResult<Self> {
        Ok(Self {
            ctx: RepositoryContext::open(config)?,
        })
    }

    pub fn context(&self) -> &RepositoryContext {
        &self.ctx
    }

    /// The checked-out branch.
    pub fn current_branch(&self) -> &Branch {
        self.ctx.branch()
    }

    // ==================== Staging ====================

    /// Stage the working copy of `path`.
    ///
    /// Content identical to the head's version clears any staged change
    /// instead, so adding an unchanged file is a no-op.
    pub fn add(&mut self, path: &str) -> RepoResult<()> {
        WorkTree::check_name(path)?;
        let bytes = self
            .ctx
            .worktree()
            .read_if_exists(path)?
            .ok_or(RepoError::FileNotFound)?;

        let head = self.ctx.head()?;
        let digest = BlobId::for_content(&bytes);

        if head.files().get(path) == Some(&digest) {
            self.ctx.branch_mut().staging_mut().unstage(path);
            debug!(file = %path, "content matches head, cleared staging");
        } else {
            let stored = self.ctx.store().put_blob(&bytes)?;
            self.ctx.branch_mut().staging_mut().stage(path, stored);
            debug!(file = %path, blob = %digest, "staged for addition");
        }

        self.ctx.save_branch()
    }

    /// Unstage `path`, and if the head tracks it, stage its removal and
    /// delete the working file.
    pub fn rm(&mut self, path: &str) -> RepoResult<()> {
        WorkTree::check_name(path)?;
        let head = self.ctx.head()?;
        let tracked = head.files().get(path).cloned();
        let staged = self.ctx.branch().staging().is_staged_for_addition(path);

        if !staged && tracked.is_none() {
            return Err(RepoError::NoReasonToRemove);
        }

        match tracked {
            Some(blob) => {
                self.ctx.branch_mut().staging_mut().stage_removal(path, blob);
                self.ctx.worktree().delete(path)?;
                debug!(file = %path, "staged for removal");
            }
            None => {
                self.ctx.branch_mut().staging_mut().unstage(path);
                debug!(file = %path, "unstaged");
            }
        }

        self.ctx.save_branch()
    }

    // ==================== Commits ====================

    /// Fold the staging index into a new commit on the current branch.
    pub fn commit(&mut self, message: &str) -> RepoResult<CommitId> {
        if message.is_empty() {
            return Err(RepoError::EmptyMessage);
        }
        if self.ctx.branch().staging().is_empty() {
            return Err(RepoError::NothingToCommit);
        }

        let head = self.ctx.head()?;
        let files = self.ctx.branch().staging().apply_to(head.files());
        let commit = CommitBuilder::new()
            .parent(head.id().clone())
            .message(message)
            .files(files)
            .build()?;
        self.ctx.store().put_commit(&commit)?;

        self.ctx.branch_mut().advance(commit.id().clone());
        self.ctx.save_branch()?;
        info!(commit = %commit.id().short(), branch = %self.ctx.branch().name(), "committed");
        Ok(commit.id().clone())
    }

    /// First-parent history of the current head, newest first.
    pub fn log(&self) -> RepoResult<Vec<LogEntry>> {
        self.ctx
            .graph()
            .history(self.ctx.branch().head())
            .map(|commit| {
                let commit = commit?;
                Ok(LogEntry::from_commit(&commit))
            })
            .collect()
    }

    /// Every commit in the store, in id order.
    pub fn global_log(&self) -> RepoResult<Vec<LogEntry>> {
        self.ctx
            .store()
            .list_commits()?
            .iter()
            .map(|id| Ok(LogEntry::from_commit(&*self.ctx.commit(id)?)))
            .collect()
    }

    /// Ids of all commits whose message is exactly `message`.
    pub fn find(&self, message: &str) -> RepoResult<Vec<CommitId>> {
        let mut found = Vec::new();
        for id in self.ctx.store().list_commits()? {
            if self.ctx.commit(&id)?.message() == message {
                found.push(id);
            }
        }
        if found.is_empty() {
            return Err(RepoError::NoCommitWithMessage);
        }
        Ok(found)
    }

    pub fn status(&self) -> RepoResult<Status> {
        Status::collect(&self.ctx)
    }

    // ==================== Checkout / reset ====================

    /// Restore `path` in the working tree from the head commit.
    pub fn checkout_file(&self, path: &str) -> RepoResult<()> {
        WorkTree::check_name(path)?;
        let head = self.ctx.head()?;
        let blob = head.files().get(path).ok_or(RepoError::FileNotInCommit)?;
        self.ctx.checkout_blob(path, blob)
    }

    /// Restore `path` from the commit named by a full or abbreviated id.
    pub fn checkout_commit_file(&self, commit: &str, path: &str) -> RepoResult<()> {
        WorkTree::check_name(path)?;
        let commit = self.ctx.resolve_commit(commit)?;
        let blob = commit.files().get(path).ok_or(RepoError::FileNotInCommit)?;
        self.ctx.checkout_blob(path, blob)
    }

    /// Switch to another branch and rewrite the working tree to its head.
    ///
    /// Each branch keeps its own staging index across the switch.
    pub fn checkout_branch(&mut self, name: &str) -> RepoResult<()> {
        let name = BranchName::new(name).map_err(|_| RepoError::NoSuchBranch)?;
        if !self.ctx.refs().exists(&name) {
            return Err(RepoError::NoSuchBranch);
        }
        if self.ctx.branch().name() == &name {
            return Err(RepoError::AlreadyOnBranch);
        }

        let target_branch = self.ctx.refs().load(&name)?;
        let head = self.ctx.head()?;
        let target = self.ctx.commit(target_branch.head())?;
        self.ctx.ensure_no_clobber(&head, target.files().keys())?;

        self.ctx.restore_tree(&head, &target)?;
        self.ctx.switch_to(target_branch)?;
        info!(branch = %name, "checked out branch");
        Ok(())
    }

    /// Move the current branch to `commit`, rewrite the working tree, and
    /// clear staging.
    pub fn reset(&mut self, commit: &str) -> RepoResult<CommitId> {
        let target = self.ctx.resolve_commit(commit)?;
        let head = self.ctx.head()?;
        self.ctx.ensure_no_clobber(&head, target.files().keys())?;

        self.ctx.restore_tree(&head, &target)?;
        self.ctx.branch_mut().advance(target.id().clone());
        self.ctx.save_branch()?;
        info!(commit = %target.id().short(), "reset current branch");
        Ok(target.id().clone())
    }

    // ==================== Branches ====================

    /// Create a branch at the current head.
    pub fn branch(&self, name: &str) -> RepoResult<()> {
        let name = BranchName::new(name)?;
        let head = self.ctx.branch().head().clone();
        match self.ctx.refs().create_branch(name, head) {
            Ok(branch) => {
                info!(branch = %branch.name(), "created branch");
                Ok(())
            }
            Err(StorageError::BranchAlreadyExists(_)) => Err(RepoError::BranchExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a branch pointer; its commits stay in the store.
    pub fn rm_branch(&self, name: &str) -> RepoResult<()> {
        let name = BranchName::new(name).map_err(|_| RepoError::BranchNotFound)?;
        match self.ctx.refs().delete_branch(&name) {
            Ok(()) => Ok(()),
            Err(StorageError::RefNotFound(_)) => Err(RepoError::BranchNotFound),
            Err(StorageError::InvalidOperation(_)) => Err(RepoError::CannotRemoveCurrent),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge the named branch into the current one.
    pub fn merge(&mut self, name: &str) -> RepoResult<MergeOutcome> {
        merge::merge(&mut self.ctx, name)
    }
}
