//! The `status` report.

use std::collections::BTreeMap;
use std::fmt;

use super::context::RepositoryContext;
use super::error::RepoResult;
use crate::storage::{BlobId, BranchName};

/// How a working file differs from what the next commit would record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
    Modified,
    Deleted,
}

impl fmt::Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modification::Modified => write!(f, "modified"),
            Modification::Deleted => write!(f, "deleted"),
        }
    }
}

/// Snapshot of branch, staging and working-tree state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub current: BranchName,
    pub branches: Vec<BranchName>,
    pub staged: Vec<String>,
    pub removed: Vec<String>,
    pub not_staged: Vec<(String, Modification)>,
    pub untracked: Vec<String>,
}

impl Status {
    pub(crate) fn collect(ctx: &RepositoryContext) -> RepoResult<Self> {
        let branch = ctx.branch();
        let staging = branch.staging();
        let head = ctx.head()?;
        let tree = ctx.worktree();

        // what the next commit would record for each path, if nothing else changed
        let mut expected: BTreeMap<&String, &BlobId> = head
            .files()
            .iter()
            .filter(|(path, _)| !staging.is_staged_for_removal(path))
            .collect();
        expected.extend(staging.additions().iter());

        let mut not_staged = Vec::new();
        for (path, blob) in expected {
            match tree.read_if_exists(path)? {
                None => not_staged.push((path.clone(), Modification::Deleted)),
                Some(bytes) if &BlobId::for_content(&bytes) != blob => {
                    not_staged.push((path.clone(), Modification::Modified))
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            current: branch.name().clone(),
            branches: ctx.refs().list()?,
            staged: staging.additions().keys().cloned().collect(),
            removed: staging.removals().keys().cloned().collect(),
            not_staged,
            untracked: ctx.untracked_files(&head)?,
        })
    }

    /// true when nothing is staged, modified or untracked
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.removed.is_empty()
            && self.not_staged.is_empty()
            && self.untracked.is_empty()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Branches ===")?;
        for name in &self.branches {
            if name == &self.current {
                writeln!(f, "*{}", name)?;
            } else {
                writeln!(f, "{}", name)?;
            }
        }
        writeln!(f)?;

        writeln!(f, "=== Staged Files ===")?;
        for path in &self.staged {
            writeln!(f, "{}", path)?;
        }
        writeln!(f)?;

        writeln!(f, "=== Removed Files ===")?;
        for path in &self.removed {
            writeln!(f, "{}", path)?;
        }
        writeln!(f)?;

        writeln!(f, "=== Modifications Not Staged For Commit ===")?;
        for (path, kind) in &self.not_staged {
            writeln!(f, "{} ({})", path, kind)?;
        }
        writeln!(f)?;

        writeln!(f, "=== Untracked Files ===")?;
        for path in &self.untracked {
            writeln!(f, "{}", path)?;
        }
        writeln!(f)
    }
}
