//! Content-addressed object store.
//!
//! Blobs and commits live in two flat directories, one file per object,
//! named by the object's digest. The store is append-only: there is no
//! update or delete.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::storage::atomic::write_atomic;
use crate::storage::commit::{self, Commit};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, CommitId, DIGEST_HEX_LEN};

const BLOBS_DIR: &str = "blobs";
const COMMITS_DIR: &str = "commits";

/// Append-only store of blobs and commits.
///
/// Decoded commits are cached, so walking the graph or building a merge
/// context never parses the same commit twice in one invocation.
#[derive(Debug)]
pub struct ObjectStore {
    blobs: PathBuf,
    commits: PathBuf,
    cache: RwLock<HashMap<CommitId, Arc<Commit>>>,
}

impl ObjectStore {
    /// Open the store rooted at `dir` (expects the layout made by `create`).
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            blobs: dir.join(BLOBS_DIR),
            commits: dir.join(COMMITS_DIR),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create the directory layout and open the store.
    pub fn create(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let store = Self::open(dir);
        fs::create_dir_all(&store.blobs)?;
        fs::create_dir_all(&store.commits)?;
        Ok(store)
    }

    // ==================== Blobs ====================

    /// Store content and return its digest. Storing the same bytes twice is a no-op.
    pub fn put_blob(&self, bytes: &[u8]) -> StorageResult<BlobId> {
        let id = BlobId::for_content(bytes);
        let path = self.blobs.join(id.as_str());
        if !path.exists() {
            write_atomic(&path, bytes)?;
            debug!(blob = %id, size = bytes.len(), "stored blob");
        }
        Ok(id)
    }

    /// Read a blob's content.
    pub fn get_blob(&self, id: &BlobId) -> StorageResult<Vec<u8>> {
        match fs::read(self.blobs.join(id.as_str())) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::BlobNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn has_blob(&self, id: &BlobId) -> bool {
        self.blobs.join(id.as_str()).is_file()
    }

    // ==================== Commits ====================

    /// Store a commit under its own id. Idempotent.
    pub fn put_commit(&self, commit: &Commit) -> StorageResult<()> {
        let path = self.commits.join(commit.id().as_str());
        if !path.exists() {
            let bytes = commit::serialize_commit(commit)?;
            write_atomic(&path, &bytes)?;
            debug!(commit = %commit.id(), "stored commit");
        }
        self.cache
            .write()
            .insert(commit.id().clone(), Arc::new(commit.clone()));
        Ok(())
    }

    /// Load a commit by full id.
    pub fn get_commit(&self, id: &CommitId) -> StorageResult<Arc<Commit>> {
        if let Some(commit) = self.cache.read().get(id) {
            return Ok(Arc::clone(commit));
        }

        let bytes = match fs::read(self.commits.join(id.as_str())) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::CommitNotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let commit = Arc::new(commit::deserialize_commit(&bytes, id)?);
        self.cache.write().insert(id.clone(), Arc::clone(&commit));
        Ok(commit)
    }

    pub fn has_commit(&self, id: &CommitId) -> bool {
        self.cache.read().contains_key(id) || self.commits.join(id.as_str()).is_file()
    }

    /// All commit ids in the store, sorted.
    pub fn list_commits(&self) -> StorageResult<Vec<CommitId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.commits)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            // skip anything that is not an object (e.g. leftover temp files)
            if let Some(id) = name.to_str().and_then(|n| CommitId::from_hex(n).ok()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Resolve a full or abbreviated commit id.
    ///
    /// Exactly one stored commit must start with `prefix`.
    pub fn resolve_commit(&self, prefix: &str) -> StorageResult<CommitId> {
        let prefix = prefix.to_ascii_lowercase();

        if prefix.len() == DIGEST_HEX_LEN {
            if let Ok(id) = CommitId::from_hex(&prefix) {
                if self.has_commit(&id) {
                    return Ok(id);
                }
            }
            return Err(StorageError::AmbiguousOrNotFound { prefix, matches: 0 });
        }

        if prefix.is_empty() {
            return Err(StorageError::AmbiguousOrNotFound { prefix, matches: 0 });
        }

        let matches: Vec<CommitId> = self
            .list_commits()?
            .into_iter()
            .filter(|id| id.as_str().starts_with(&prefix))
            .collect();

        match matches.as_slice() {
            [only] => Ok(only.clone()),
            _ => Err(StorageError::AmbiguousOrNotFound {
                prefix,
                matches: matches.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::commit::CommitBuilder;
    use crate::storage::types::FileMap;
    use chrono::DateTime;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::create(dir.path()).unwrap();
        (dir, store)
    }

    fn child(parent: &Commit, message: &str) -> Commit {
        CommitBuilder::new()
            .parent(parent.id().clone())
            .message(message)
            .timestamp(DateTime::from_timestamp(1_000, 0).unwrap())
            .files(FileMap::new())
            .build()
            .unwrap()
    }

    #[test]
    fn test_blob_roundtrip() {
        let (_dir, store) = setup();
        let id = store.put_blob(b"hello world\n").unwrap();
        assert!(store.has_blob(&id));
        assert_eq!(store.get_blob(&id).unwrap(), b"hello world\n");
    }

    #[test]
    fn test_put_blob_is_idempotent() {
        let (dir, store) = setup();
        let a = store.put_blob(b"same").unwrap();
        let b = store.put_blob(b"same").unwrap();
        assert_eq!(a, b);

        let count = fs::read_dir(dir.path().join(BLOBS_DIR)).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_missing_blob() {
        let (_dir, store) = setup();
        let id = BlobId::for_content(b"never stored");
        let result = store.get_blob(&id);
        assert!(matches!(result, Err(StorageError::BlobNotFound(_))));
    }

    #[test]
    fn test_commit_roundtrip_through_disk() {
        let (dir, store) = setup();
        let root = Commit::initial();
        store.put_commit(&root).unwrap();

        // a fresh handle has an empty cache and must decode from disk
        let reopened = ObjectStore::open(dir.path());
        let loaded = reopened.get_commit(root.id()).unwrap();
        assert_eq!(*loaded, root);
    }

    #[test]
    fn test_missing_commit() {
        let (_dir, store) = setup();
        let id = Commit::initial().id().clone();
        assert!(!store.has_commit(&id));
        assert!(matches!(store.get_commit(&id), Err(StorageError::CommitNotFound(_))));
    }

    #[test]
    fn test_list_commits_sorted() {
        let (_dir, store) = setup();
        let root = Commit::initial();
        let a = child(&root, "a");
        let b = child(&root, "b");
        for c in [&root, &a, &b] {
            store.put_commit(c).unwrap();
        }

        let ids = store.list_commits().unwrap();
        assert_eq!(ids.len(), 3);
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_resolve_full_and_prefix() {
        let (_dir, store) = setup();
        let root = Commit::initial();
        store.put_commit(&root).unwrap();

        assert_eq!(&store.resolve_commit(root.id().as_str()).unwrap(), root.id());
        assert_eq!(&store.resolve_commit(root.id().short()).unwrap(), root.id());
        assert_eq!(
            &store
                .resolve_commit(&root.id().as_str()[..10].to_ascii_uppercase())
                .unwrap(),
            root.id()
        );
    }

    #[test]
    fn test_resolve_unknown_and_ambiguous() {
        let (_dir, store) = setup();
        let root = Commit::initial();
        store.put_commit(&root).unwrap();
        let mut others = Vec::new();
        for i in 0..40 {
            let c = child(&root, &format!("c{}", i));
            store.put_commit(&c).unwrap();
            others.push(c);
        }

        let missing = store.resolve_commit("zzzz");
        assert!(matches!(
            missing,
            Err(StorageError::AmbiguousOrNotFound { matches: 0, .. })
        ));

        // 41 commits over 16 leading hex digits: some first digit is shared
        let mut counts: HashMap<char, usize> = HashMap::new();
        for id in store.list_commits().unwrap() {
            *counts.entry(id.as_str().chars().next().unwrap()).or_default() += 1;
        }
        let (shared, n) = counts.into_iter().find(|(_, n)| *n > 1).unwrap();
        let ambiguous = store.resolve_commit(&shared.to_string());
        assert!(matches!(
            ambiguous,
            Err(StorageError::AmbiguousOrNotFound { matches, .. }) if matches == n
        ));

        assert!(store.resolve_commit("").is_err());
    }
}
