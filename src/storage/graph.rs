//! Traversal over the parent-linked commit DAG.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::storage::commit::Commit;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::objects::ObjectStore;
use crate::storage::refs::RefManager;
use crate::storage::types::{BranchName, CommitId};

/// Read-only view of the commit graph held by an object store.
#[derive(Debug, Clone, Copy)]
pub struct CommitGraph<'a> {
    store: &'a ObjectStore,
}

impl<'a> CommitGraph<'a> {
    pub fn new(store: &'a ObjectStore) -> Self {
        Self { store }
    }

    /// Every commit reachable from `start`, including `start`.
    ///
    /// Breadth-first over both parent links; the visited set keeps diamonds
    /// left by earlier merges from being expanded twice.
    pub fn ancestors(&self, start: &CommitId) -> StorageResult<HashSet<CommitId>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start.clone()]);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let commit = self.store.get_commit(&id)?;
            for parent in commit.parents() {
                if !visited.contains(parent) {
                    queue.push_back(parent.clone());
                }
            }
        }

        Ok(visited)
    }

    /// Lowest common ancestor of `a` and `b`.
    ///
    /// Collects the full ancestor set of `a`, then walks breadth-first from
    /// `b` and returns the first commit found in that set, i.e. the common
    /// ancestor nearest to `b`.
    pub fn split_point(&self, a: &CommitId, b: &CommitId) -> StorageResult<Option<CommitId>> {
        let from_a = self.ancestors(a)?;

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([b.clone()]);
        while let Some(id) = queue.pop_front() {
            if from_a.contains(&id) {
                return Ok(Some(id));
            }
            if !seen.insert(id.clone()) {
                continue;
            }
            let commit = self.store.get_commit(&id)?;
            for parent in commit.parents() {
                if !seen.contains(parent) {
                    queue.push_back(parent.clone());
                }
            }
        }

        Ok(None)
    }

    /// Split point of two branch heads, looked up by name.
    pub fn branch_split_point(
        &self,
        refs: &RefManager,
        a: &BranchName,
        b: &BranchName,
    ) -> StorageResult<CommitId> {
        let load = |name: &BranchName| {
            refs.load(name).map_err(|e| match e {
                StorageError::RefNotFound(n) => {
                    StorageError::InvalidOperation(format!("branch '{}' does not exist", n))
                }
                other => other,
            })
        };
        let head_a = load(a)?.head().clone();
        let head_b = load(b)?.head().clone();

        let split = self.split_point(&head_a, &head_b)?.ok_or_else(|| {
            StorageError::corrupted(
                refs.refs_dir(),
                format!("branches '{}' and '{}' share no root", a, b),
            )
        })?;
        debug!(%a, %b, split = %split.short(), "computed split point");
        Ok(split)
    }

    /// First-parent history from `start`, newest first.
    pub fn history(&self, start: &CommitId) -> HistoryIterator<'a> {
        HistoryIterator {
            store: self.store,
            next: Some(start.clone()),
        }
    }
}

/// iterate over first-parent history starting from a commit
pub struct HistoryIterator<'a> {
    store: &'a ObjectStore,
    next: Option<CommitId>,
}

impl Iterator for HistoryIterator<'_> {
    type Item = StorageResult<Arc<Commit>>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        match self.store.get_commit(&id) {
            Ok(commit) => {
                self.next = commit.first_parent().cloned();
                Some(Ok(commit))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
