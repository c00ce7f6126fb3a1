//! Three-way merge of another branch into the current one.
//!
//! The merge runs in three phases:
//!
//! 1. preconditions: names, staging, split point, untracked collisions,
//!    then the ancestor and fast-forward cases. Nothing is written before
//!    all of them pass.
//! 2. planning: every path in the union of the split, current and given
//!    snapshots is classified into one [`MergeAction`], and every byte the
//!    merge will write is read up front.
//! 3. applying: working-tree writes, one merge commit, branch update.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::context::RepositoryContext;
use super::error::{RepoError, RepoResult};
use crate::storage::{
    BlobId, BranchName, Commit, CommitBuilder, CommitId, CommitMessage, Staging, StorageError,
};

const CONFLICT_HEAD: &[u8] = b"<<<<<<< HEAD\n";
const CONFLICT_SEP: &[u8] = b"=======\n";
const CONFLICT_END: &[u8] = b">>>>>>>\n";

/// What a merge did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The current head was an ancestor of the given head and simply moved.
    FastForwarded { head: CommitId },
    /// A two-parent merge commit was created.
    Merged {
        commit: CommitId,
        conflicts: Vec<String>,
    },
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        matches!(self, MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty())
    }
}

/// Per-path decision of the three-way comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    /// leave the current version (or absence) as is
    Keep,
    /// take the given branch's version
    TakeGiven(BlobId),
    /// delete from working tree and result
    Delete,
    /// both sides changed the path differently; `None` means absent on that side
    Conflict {
        current: Option<BlobId>,
        given: Option<BlobId>,
    },
}

/// Classify one path by its digest in the split, current and given snapshots.
pub fn classify(
    split: Option<&BlobId>,
    current: Option<&BlobId>,
    given: Option<&BlobId>,
) -> MergeAction {
    // both sides agree, including both deleted
    if current == given {
        return MergeAction::Keep;
    }

    match (split, current, given) {
        (Some(s), Some(c), None) if c == s => MergeAction::Delete,
        (Some(s), Some(c), Some(g)) if c == s => MergeAction::TakeGiven(g.clone()),
        (Some(s), Some(_), Some(g)) if g == s => MergeAction::Keep,
        (Some(s), None, Some(g)) if g == s => MergeAction::Keep,
        (Some(_), _, _) => MergeAction::Conflict {
            current: current.cloned(),
            given: given.cloned(),
        },
        (None, Some(_), None) => MergeAction::Keep,
        (None, None, Some(g)) => MergeAction::TakeGiven(g.clone()),
        (None, Some(c), Some(g)) => MergeAction::Conflict {
            current: Some(c.clone()),
            given: Some(g.clone()),
        },
        (None, None, None) => MergeAction::Keep,
    }
}

/// Working-file content for a conflicted path.
pub fn conflict_content(current: &[u8], given: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        CONFLICT_HEAD.len() + current.len() + CONFLICT_SEP.len() + given.len() + CONFLICT_END.len(),
    );
    out.extend_from_slice(CONFLICT_HEAD);
    out.extend_from_slice(current);
    out.extend_from_slice(CONFLICT_SEP);
    out.extend_from_slice(given);
    out.extend_from_slice(CONFLICT_END);
    out
}

/// The three snapshots of one merge, loaded once.
struct MergeContext {
    current_name: BranchName,
    given_name: BranchName,
    current: Arc<Commit>,
    given: Arc<Commit>,
    split: Arc<Commit>,
}

impl MergeContext {
    fn paths(&self) -> BTreeSet<&String> {
        self.split
            .files()
            .keys()
            .chain(self.current.files().keys())
            .chain(self.given.files().keys())
            .collect()
    }

    /// Every path whose action is not `Keep`, in path order.
    fn plan(&self) -> Vec<(String, MergeAction)> {
        self.paths()
            .into_iter()
            .filter_map(|path| {
                let action = classify(
                    self.split.files().get(path),
                    self.current.files().get(path),
                    self.given.files().get(path),
                );
                debug!(file = %path, ?action, "classified");
                match action {
                    MergeAction::Keep => None,
                    action => Some((path.clone(), action)),
                }
            })
            .collect()
    }
}

/// A fully resolved working-tree change.
enum PlannedWrite {
    Take { path: String, blob: BlobId, bytes: Vec<u8> },
    Delete { path: String, blob: BlobId },
    Conflict { path: String, bytes: Vec<u8> },
}

/// Merge branch `name` into the current branch.
pub(crate) fn merge(ctx: &mut RepositoryContext, name: &str) -> RepoResult<MergeOutcome> {
    // ---- preconditions ----
    if ctx.branch().name().as_str() == name {
        return Err(RepoError::MergeWithSelf);
    }
    let given_name = BranchName::new(name).map_err(|_| RepoError::BranchNotFound)?;
    if !ctx.refs().exists(&given_name) {
        return Err(RepoError::BranchNotFound);
    }
    if !ctx.branch().staging().is_empty() {
        return Err(RepoError::UncommittedChanges);
    }

    let current_name = ctx.branch().name().clone();
    let given_branch = ctx.refs().load(&given_name)?;
    let split_id = ctx
        .graph()
        .branch_split_point(ctx.refs(), &current_name, &given_name)?;

    let mctx = MergeContext {
        current: ctx.head()?,
        given: ctx.commit(given_branch.head())?,
        split: ctx.commit(&split_id)?,
        current_name,
        given_name,
    };

    // in the fast-forward case the plan writes exactly the files that differ
    // from the current head; in the ancestor case it writes nothing
    let plan = mctx.plan();
    let written = plan.iter().filter_map(|(path, action)| match action {
        MergeAction::TakeGiven(_) | MergeAction::Conflict { .. } => Some(path),
        MergeAction::Keep | MergeAction::Delete => None,
    });
    ctx.ensure_no_clobber(&mctx.current, written)?;

    if mctx.split.id() == mctx.given.id() {
        return Err(RepoError::GivenIsAncestor);
    }

    if mctx.split.id() == mctx.current.id() {
        return fast_forward(ctx, &mctx);
    }

    // ---- read everything the merge will write ----
    let mut writes = Vec::with_capacity(plan.len());
    for (path, action) in plan {
        let write = match action {
            MergeAction::Keep => continue,
            MergeAction::TakeGiven(blob) => PlannedWrite::Take {
                bytes: ctx.blob(&blob)?,
                path,
                blob,
            },
            MergeAction::Delete => {
                let blob = mctx.current.files().get(&path).cloned().ok_or_else(|| {
                    StorageError::Internal(format!("delete planned for untracked path {}", path))
                })?;
                PlannedWrite::Delete { path, blob }
            }
            MergeAction::Conflict { current, given } => {
                let ours = match &current {
                    Some(blob) => ctx.blob(blob)?,
                    None => Vec::new(),
                };
                let theirs = match &given {
                    Some(blob) => ctx.blob(blob)?,
                    None => Vec::new(),
                };
                PlannedWrite::Conflict {
                    path,
                    bytes: conflict_content(&ours, &theirs),
                }
            }
        };
        writes.push(write);
    }

    // ---- apply ----
    let mut staged = Staging::default();
    let mut conflicts = Vec::new();
    for write in writes {
        match write {
            PlannedWrite::Take { path, blob, bytes } => {
                ctx.worktree().write(&path, &bytes)?;
                staged.stage(path, blob);
            }
            PlannedWrite::Delete { path, blob } => {
                ctx.worktree().delete(&path)?;
                staged.stage_removal(path, blob);
            }
            PlannedWrite::Conflict { path, bytes } => {
                let blob = ctx.store().put_blob(&bytes)?;
                ctx.worktree().write(&path, &bytes)?;
                warn!(file = %path, "merge conflict");
                staged.stage(path.clone(), blob);
                conflicts.push(path);
            }
        }
    }

    let files = staged.apply_to(mctx.current.files());
    let commit = CommitBuilder::new()
        .parents(vec![mctx.current.id().clone(), mctx.given.id().clone()])
        .message(CommitMessage::merge(
            mctx.given_name.as_str(),
            mctx.current_name.as_str(),
        ))
        .files(files)
        .build()?;
    ctx.store().put_commit(&commit)?;

    let branch = ctx.branch_mut();
    branch.advance(commit.id().clone());
    branch.record_merge(mctx.given_name.clone());
    ctx.save_branch()?;

    info!(
        commit = %commit.id().short(),
        given = %mctx.given_name,
        conflicts = conflicts.len(),
        "merged"
    );
    Ok(MergeOutcome::Merged {
        commit: commit.id().clone(),
        conflicts,
    })
}

/// The current head is the split point: move it to the given head.
fn fast_forward(ctx: &mut RepositoryContext, mctx: &MergeContext) -> RepoResult<MergeOutcome> {
    ctx.restore_tree(&mctx.current, &mctx.given)?;
    ctx.branch_mut().advance(mctx.given.id().clone());
    ctx.save_branch()?;
    info!(head = %mctx.given.id().short(), given = %mctx.given_name, "fast-forwarded");
    Ok(MergeOutcome::FastForwarded {
        head: mctx.given.id().clone(),
    })
}
