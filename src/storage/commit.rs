//!  Commit creation and (de)serialization
//!
//! a commit is an immutable snapshot: message, timestamp, zero to two parents
//! and a path -> blob mapping. Its id is a digest of exactly those fields, so
//! two commits built from the same inputs within the same second are the
//! same commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{CommitId, FileMap};

/// an immutable snapshot in the commit graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    id: CommitId,
    message: String,
    timestamp: DateTime<Utc>,
    parents: Vec<CommitId>,
    files: FileMap,
}

impl Commit {
    /// the root commit every repository starts from
    pub fn initial() -> Self {
        let timestamp = DateTime::<Utc>::UNIX_EPOCH;
        let files = FileMap::new();
        let id = compute_id(CommitMessage::INITIAL, &timestamp, &[], &files);
        Self {
            id,
            message: CommitMessage::INITIAL.to_string(),
            timestamp,
            parents: Vec::new(),
            files,
        }
    }

    pub fn id(&self) -> &CommitId {
        &self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn parents(&self) -> &[CommitId] {
        &self.parents
    }

    /// tracked files; read-only, derive a new map to build the next commit
    pub fn files(&self) -> &FileMap {
        &self.files
    }

    /// check if this is a merge commit (has two parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<&CommitId> {
        self.parents.first()
    }
}

/// digest over the identifying fields of a commit
///
/// every field is length-prefixed so no two field sequences share a preimage.
pub fn compute_id(
    message: &str,
    timestamp: &DateTime<Utc>,
    parents: &[CommitId],
    files: &FileMap,
) -> CommitId {
    fn field(hasher: &mut Sha256, bytes: &[u8]) {
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    }

    let mut hasher = Sha256::new();
    field(&mut hasher, message.as_bytes());
    hasher.update(timestamp.timestamp().to_be_bytes());
    hasher.update((parents.len() as u64).to_be_bytes());
    for parent in parents {
        field(&mut hasher, parent.as_str().as_bytes());
    }
    hasher.update((files.len() as u64).to_be_bytes());
    for (path, blob) in files {
        field(&mut hasher, path.as_bytes());
        field(&mut hasher, blob.as_str().as_bytes());
    }

    CommitId::new(hex::encode(hasher.finalize()))
}

/// builder for creating commits with a fluent interface
///
/// root, normal and merge commits all come out of here; the variant is the
/// length of the parent list.
#[derive(Debug, Default)]
pub struct CommitBuilder {
    parents: Vec<CommitId>,
    message: String,
    timestamp: Option<DateTime<Utc>>,
    files: FileMap,
}

impl CommitBuilder {
    /// create a new CommitBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    /// set both parents (for merge commits)
    pub fn parents(mut self, parents: Vec<CommitId>) -> Self {
        self.parents = parents;
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the timestamp; defaults to now
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// set the complete file mapping of the snapshot
    pub fn files(mut self, files: FileMap) -> Self {
        self.files = files;
        self
    }

    /// create the commit value
    pub fn build(self) -> StorageResult<Commit> {
        if self.parents.is_empty() {
            return Ok(Commit::initial());
        }
        if self.parents.len() > 2 {
            return Err(StorageError::Internal(format!(
                "a commit has at most two parents, got {}",
                self.parents.len()
            )));
        }
        if self.message.is_empty() {
            return Err(StorageError::InvalidOperation(
                "commit message cannot be empty".to_string(),
            ));
        }

        // ids are defined to the second
        let timestamp = truncate_to_second(self.timestamp.unwrap_or_else(Utc::now));
        let id = compute_id(&self.message, &timestamp, &self.parents, &self.files);

        Ok(Commit {
            id,
            message: self.message,
            timestamp,
            parents: self.parents,
            files: self.files,
        })
    }
}

fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}

/// on-disk format of a commit
#[derive(Serialize, Deserialize)]
struct CommitJson {
    id: CommitId,
    message: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    timestamp: DateTime<Utc>,
    parents: Vec<CommitId>,
    files: FileMap,
}

/// serialize a commit to JSON bytes
pub fn serialize_commit(commit: &Commit) -> StorageResult<Vec<u8>> {
    let json = CommitJson {
        id: commit.id.clone(),
        message: commit.message.clone(),
        timestamp: commit.timestamp,
        parents: commit.parents.clone(),
        files: commit.files.clone(),
    };
    Ok(serde_json::to_vec_pretty(&json)?)
}

/// deserialize a commit from JSON bytes
///
/// validates that both the recorded id and the id recomputed from the
/// content match the id the object was stored under
pub fn deserialize_commit(bytes: &[u8], expected: &CommitId) -> StorageResult<Commit> {
    let json: CommitJson = serde_json::from_slice(bytes)
        .map_err(|e| StorageError::corrupted(expected.as_str(), e.to_string()))?;

    if &json.id != expected {
        return Err(StorageError::corrupted(
            expected.as_str(),
            format!("object stored as '{}' records id '{}'", expected, json.id),
        ));
    }

    let recomputed = compute_id(&json.message, &json.timestamp, &json.parents, &json.files);
    if &recomputed != expected {
        return Err(StorageError::corrupted(
            expected.as_str(),
            format!("content hashes to '{}'", recomputed),
        ));
    }

    Ok(Commit {
        id: json.id,
        message: json.message,
        timestamp: json.timestamp,
        parents: json.parents,
        files: json.files,
    })
}

/// message formatting for generated commits
pub struct CommitMessage;

impl CommitMessage {
    /// fixed message of the root commit
    pub const INITIAL: &'static str = "initial commit";

    /// message of a merge commit
    pub fn merge(given: &str, current: &str) -> String {
        format!("Merged {} into {}.", given, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::BlobId;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn files(entries: &[(&str, &[u8])]) -> FileMap {
        entries
            .iter()
            .map(|(path, content)| (path.to_string(), BlobId::for_content(content)))
            .collect()
    }

    #[test]
    fn test_initial_commit() {
        let root = Commit::initial();
        assert_eq!(root.message(), "initial commit");
        assert!(root.is_root());
        assert!(root.files().is_empty());
        assert_eq!(root.timestamp().timestamp(), 0);
        // stable across calls
        assert_eq!(root.id(), Commit::initial().id());
    }

    #[test]
    fn test_builder_without_parents_is_root() {
        let c = CommitBuilder::new()
            .message("ignored")
            .timestamp(ts(99))
            .build()
            .unwrap();
        assert_eq!(c, Commit::initial());
    }

    #[test]
    fn test_commit_builder() {
        let root = Commit::initial();
        let c = CommitBuilder::new()
            .parent(root.id().clone())
            .message("add wug")
            .timestamp(ts(1_000))
            .files(files(&[("wug.txt", b"wug")]))
            .build()
            .unwrap();

        assert_eq!(c.parents(), &[root.id().clone()]);
        assert_eq!(c.first_parent(), Some(root.id()));
        assert!(!c.is_merge());
        assert_eq!(c.files().len(), 1);
    }

    #[test]
    fn test_identical_inputs_give_identical_ids() {
        let root = Commit::initial();
        let make = || {
            CommitBuilder::new()
                .parent(root.id().clone())
                .message("same")
                .timestamp(ts(42))
                .files(files(&[("a", b"1")]))
                .build()
                .unwrap()
        };
        assert_eq!(make().id(), make().id());
    }

    #[test]
    fn test_any_field_changes_id() {
        let root = Commit::initial();
        let base = CommitBuilder::new()
            .parent(root.id().clone())
            .message("m")
            .timestamp(ts(42))
            .files(files(&[("a", b"1")]));
        let reference = base.build().unwrap();

        let other_msg = CommitBuilder::new()
            .parent(root.id().clone())
            .message("n")
            .timestamp(ts(42))
            .files(files(&[("a", b"1")]))
            .build()
            .unwrap();
        let other_time = CommitBuilder::new()
            .parent(root.id().clone())
            .message("m")
            .timestamp(ts(43))
            .files(files(&[("a", b"1")]))
            .build()
            .unwrap();
        let other_files = CommitBuilder::new()
            .parent(root.id().clone())
            .message("m")
            .timestamp(ts(42))
            .files(files(&[("a", b"2")]))
            .build()
            .unwrap();

        assert_ne!(reference.id(), other_msg.id());
        assert_ne!(reference.id(), other_time.id());
        assert_ne!(reference.id(), other_files.id());
    }

    #[test]
    fn test_subsecond_precision_is_dropped() {
        let root = Commit::initial();
        let a = ts(500) + chrono::Duration::milliseconds(10);
        let b = ts(500) + chrono::Duration::milliseconds(900);
        let make = |t| {
            CommitBuilder::new()
                .parent(root.id().clone())
                .message("m")
                .timestamp(t)
                .build()
                .unwrap()
        };
        assert_eq!(make(a).id(), make(b).id());
    }

    #[test]
    fn test_merge_commit_and_too_many_parents() {
        let root = Commit::initial();
        let left = CommitBuilder::new()
            .parent(root.id().clone())
            .message("left")
            .timestamp(ts(1))
            .build()
            .unwrap();
        let right = CommitBuilder::new()
            .parent(root.id().clone())
            .message("right")
            .timestamp(ts(1))
            .build()
            .unwrap();

        let merge = CommitBuilder::new()
            .parents(vec![left.id().clone(), right.id().clone()])
            .message(CommitMessage::merge("right", "left"))
            .timestamp(ts(2))
            .build()
            .unwrap();
        assert!(merge.is_merge());
        assert_eq!(merge.message(), "Merged right into left.");

        let result = CommitBuilder::new()
            .parents(vec![left.id().clone(), right.id().clone(), root.id().clone()])
            .message("octopus")
            .build();
        assert!(matches!(result, Err(StorageError::Internal(_))));
    }

    #[test]
    fn test_empty_message_rejected() {
        let result = CommitBuilder::new()
            .parent(Commit::initial().id().clone())
            .build();
        assert!(matches!(result, Err(StorageError::InvalidOperation(_))));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let root = Commit::initial();
        let c = CommitBuilder::new()
            .parent(root.id().clone())
            .message("two files")
            .timestamp(ts(1_700_000_000))
            .files(files(&[("a.txt", b"a"), ("b.txt", b"b")]))
            .build()
            .unwrap();

        let bytes = serialize_commit(&c).unwrap();
        let restored = deserialize_commit(&bytes, c.id()).unwrap();
        assert_eq!(restored, c);
    }

    #[test]
    fn test_id_mismatch_detection() {
        let c = Commit::initial();
        let bytes = serialize_commit(&c).unwrap();
        let wrong = CommitId::new("0".repeat(64));

        let result = deserialize_commit(&bytes, &wrong);
        assert!(matches!(result, Err(StorageError::CorruptedData { .. })));
    }

    #[test]
    fn test_tampered_content_detection() {
        let c = Commit::initial();
        let text = String::from_utf8(serialize_commit(&c).unwrap()).unwrap();
        let tampered = text.replace("initial commit", "rewritten history");

        let result = deserialize_commit(tampered.as_bytes(), c.id());
        assert!(matches!(result, Err(StorageError::CorruptedData { .. })));
    }
}
