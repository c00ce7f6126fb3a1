//! Gitlite - a small content-addressed version-control system
//!
//! Snapshots of a flat working directory are stored as commits in a local
//! object store under `.gitlite/`. Branches are named, movable pointers with
//! their own staging index, and branches are reconciled by a three-way merge
//! against their nearest common ancestor.
//!
//! # Example
//!
//! ```no_run
//! use gitlite::repo::{Repository, RepositoryConfig};
//!
//! let mut repo = Repository::init(RepositoryConfig::new("./project")).unwrap();
//! std::fs::write("./project/notes.txt", "hello").unwrap();
//! repo.add("notes.txt").unwrap();
//! repo.commit("add notes").unwrap();
//! ```

pub mod repo;
pub mod storage;
pub mod worktree;
