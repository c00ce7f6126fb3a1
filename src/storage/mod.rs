//! storage layer for gitlite
//!
//! everything that is persisted lives here: the append-only object store,
//! the mutable branch references, and the graph walks over stored commits.
//! The repository layer composes these and never touches the metadata
//! directory on its own.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 repo::Repository / merge                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    graph    │       │   objects   │       │    refs     │
//!  │ (ancestry)  │──────▶│(blob,commit)│       │ (branches)  │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!                               │
//!                               ▼
//!                        ┌─────────────┐
//!                        │   commit    │
//!                        │ (snapshot)  │
//!                        └─────────────┘
//!  ```
//!
//! # On-disk layout
//!
//! ```text
//! .gitlite/
//!   HEAD                  name of the checked-out branch
//!   objects/blobs/<id>    raw file content
//!   objects/commits/<id>  JSON commit
//!   refs/<branch>         JSON branch (head, staging, merge provenance)
//! ```

mod atomic;
mod commit;
mod error;
mod graph;
mod objects;
mod refs;
mod types;

// Re-export public API
pub use commit::{compute_id, Commit, CommitBuilder, CommitMessage};
pub use error::{StorageError, StorageResult};
pub use graph::{CommitGraph, HistoryIterator};
pub use objects::ObjectStore;
pub use refs::{Branch, RefManager, Staging};
pub use types::{
    validate_file_name, BlobId, BranchName, CommitId, FileMap, InvalidNameError, DIGEST_HEX_LEN,
};
