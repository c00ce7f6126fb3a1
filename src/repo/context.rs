//! Per-invocation repository context.
//!
//! Built once at the start of every command: it opens the store and refs,
//! resolves the checked-out branch, and is then threaded through the
//! operation. Nothing else reads the current-branch pointer.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::config::RepositoryConfig;
use super::error::{RepoError, RepoResult};
use crate::storage::{
    BlobId, Branch, Commit, CommitGraph, CommitId, ObjectStore, RefManager, StorageError,
};
use crate::worktree::WorkTree;

pub struct RepositoryContext {
    config: RepositoryConfig,
    store: ObjectStore,
    refs: RefManager,
    worktree: WorkTree,
    branch: Branch,
}

impl RepositoryContext {
    /// Open an initialized repository and resolve the current branch.
    pub fn open(config: RepositoryConfig) -> RepoResult<Self> {
        if !config.meta_dir().is_dir() {
            return Err(RepoError::NotInitialized);
        }

        let store = ObjectStore::open(config.objects_dir());
        let refs = RefManager::open(config.refs_dir(), config.head_file());
        let branch = refs.current_branch()?;
        let worktree = WorkTree::new(config.work_dir());
        debug!(branch = %branch.name(), head = %branch.head().short(), "opened repository");

        Ok(Self {
            config,
            store,
            refs,
            worktree,
            branch,
        })
    }

    /// Create the metadata layout, the root commit and the default branch.
    pub fn init(config: RepositoryConfig) -> RepoResult<Self> {
        if config.meta_dir().exists() {
            return Err(RepoError::AlreadyInitialized);
        }

        let store = ObjectStore::create(config.objects_dir())?;
        let root = Commit::initial();
        store.put_commit(&root)?;

        let branch = Branch::new(config.default_branch.clone(), root.id().clone());
        let refs = RefManager::init(config.refs_dir(), config.head_file(), &branch)?;
        let worktree = WorkTree::new(config.work_dir());
        debug!(root = %root.id().short(), "initialized repository");

        Ok(Self {
            config,
            store,
            refs,
            worktree,
            branch,
        })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn refs(&self) -> &RefManager {
        &self.refs
    }

    pub fn worktree(&self) -> &WorkTree {
        &self.worktree
    }

    pub fn graph(&self) -> CommitGraph<'_> {
        CommitGraph::new(&self.store)
    }

    /// The checked-out branch.
    pub fn branch(&self) -> &Branch {
        &self.branch
    }

    pub(crate) fn branch_mut(&mut self) -> &mut Branch {
        &mut self.branch
    }

    /// Replace the resolved current branch (after a checkout).
    pub(crate) fn switch_to(&mut self, branch: Branch) -> RepoResult<()> {
        self.refs.set_current(branch.name())?;
        self.branch = branch;
        Ok(())
    }

    /// Persist the current branch in full.
    pub(crate) fn save_branch(&self) -> RepoResult<()> {
        self.refs.save(&self.branch)?;
        Ok(())
    }

    /// Head commit of the current branch. A dangling head is corruption.
    pub fn head(&self) -> RepoResult<Arc<Commit>> {
        self.commit(self.branch.head())
    }

    /// Load a commit that a reference points at; missing means corruption.
    pub(crate) fn commit(&self, id: &CommitId) -> RepoResult<Arc<Commit>> {
        self.store.get_commit(id).map_err(|e| match e {
            StorageError::CommitNotFound(id) => RepoError::Storage(StorageError::corrupted(
                self.config.objects_dir(),
                format!("referenced commit {} is missing", id),
            )),
            other => other.into(),
        })
    }

    /// Resolve a user-supplied, possibly abbreviated, commit id.
    pub fn resolve_commit(&self, prefix: &str) -> RepoResult<Arc<Commit>> {
        let id = self.store.resolve_commit(prefix).map_err(|e| match e {
            StorageError::AmbiguousOrNotFound { .. } => RepoError::NoSuchCommit,
            other => other.into(),
        })?;
        self.commit(&id)
    }

    /// Read a blob that a commit or the staging index points at.
    pub(crate) fn blob(&self, id: &BlobId) -> RepoResult<Vec<u8>> {
        self.store.get_blob(id).map_err(|e| match e {
            StorageError::BlobNotFound(id) => RepoError::Storage(StorageError::corrupted(
                self.config.objects_dir(),
                format!("referenced blob {} is missing", id),
            )),
            other => other.into(),
        })
    }

    /// Write the content of `blob` to the working file `name`.
    pub(crate) fn checkout_blob(&self, name: &str, blob: &BlobId) -> RepoResult<()> {
        let bytes = self.blob(blob)?;
        self.worktree.write(name, &bytes)?;
        Ok(())
    }

    /// Working files neither staged for addition nor tracked by `head`
    /// (a tracked file staged for removal and then recreated counts too).
    pub fn untracked_files(&self, head: &Commit) -> RepoResult<Vec<String>> {
        Ok(self
            .worktree
            .list_files()?
            .into_iter()
            .filter(|name| !self.is_tracked(head, name))
            .collect())
    }

    /// Staged for addition, or tracked by `head` and not staged for removal.
    fn is_tracked(&self, head: &Commit, name: &str) -> bool {
        let staging = self.branch.staging();
        staging.is_staged_for_addition(name)
            || (head.files().contains_key(name) && !staging.is_staged_for_removal(name))
    }

    /// Fail if writing any of `targets` would overwrite an untracked file,
    /// in the same sense as [`Self::untracked_files`].
    pub(crate) fn ensure_no_clobber<'a>(
        &self,
        head: &Commit,
        targets: impl IntoIterator<Item = &'a String>,
    ) -> RepoResult<()> {
        for name in targets {
            if !self.is_tracked(head, name) && self.worktree.exists(name) {
                debug!(file = %name, "untracked file blocks the operation");
                return Err(RepoError::UntrackedInTheWay);
            }
        }
        Ok(())
    }

    /// Make the working tree match `target`: drop files tracked by `from`
    /// that `target` lacks, then write every file of `target`.
    pub(crate) fn restore_tree(&self, from: &Commit, target: &Commit) -> RepoResult<()> {
        let keep: BTreeSet<&String> = target.files().keys().collect();
        for name in from.files().keys() {
            if !keep.contains(name) {
                self.worktree.delete(name)?;
            }
        }
        for (name, blob) in target.files() {
            self.checkout_blob(name, blob)?;
        }
        Ok(())
    }
}
