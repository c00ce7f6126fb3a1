//!  Branch and reference management.
//!
//!  Each branch is one JSON file under the refs directory holding its head,
//!  its own staging index and its merge provenance. A single `HEAD` file
//!  names the checked-out branch.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::atomic::write_atomic;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, BranchName, CommitId, FileMap};

/// Pending additions and removals not yet folded into a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staging {
    additions: BTreeMap<String, BlobId>,
    removals: BTreeMap<String, BlobId>,
}

impl Staging {
    /// stage `path` for addition with content `blob`
    pub fn stage(&mut self, path: impl Into<String>, blob: BlobId) {
        let path = path.into();
        self.removals.remove(&path);
        self.additions.insert(path, blob);
    }

    /// drop every staged change for `path`
    pub fn unstage(&mut self, path: &str) {
        self.additions.remove(path);
        self.removals.remove(path);
    }

    /// stage `path` for removal; `blob` is its content at the time of removal
    pub fn stage_removal(&mut self, path: impl Into<String>, blob: BlobId) {
        let path = path.into();
        self.additions.remove(&path);
        self.removals.insert(path, blob);
    }

    pub fn clear(&mut self) {
        self.additions.clear();
        self.removals.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    pub fn additions(&self) -> &BTreeMap<String, BlobId> {
        &self.additions
    }

    pub fn removals(&self) -> &BTreeMap<String, BlobId> {
        &self.removals
    }

    pub fn is_staged_for_addition(&self, path: &str) -> bool {
        self.additions.contains_key(path)
    }

    pub fn is_staged_for_removal(&self, path: &str) -> bool {
        self.removals.contains_key(path)
    }

    /// Derive the next snapshot: a copy of `base` with additions applied and
    /// removals dropped. `base` itself is never touched.
    pub fn apply_to(&self, base: &FileMap) -> FileMap {
        let mut files = base.clone();
        for (path, blob) in &self.additions {
            files.insert(path.clone(), blob.clone());
        }
        for path in self.removals.keys() {
            files.remove(path);
        }
        files
    }
}

/// A named, mutable pointer into the commit graph with its own staging index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    name: BranchName,
    head: CommitId,
    #[serde(default)]
    staging: Staging,
    /// branch most recently merged into this one
    #[serde(default)]
    last_merged: Option<BranchName>,
}

impl Branch {
    pub fn new(name: BranchName, head: CommitId) -> Self {
        Self {
            name,
            head,
            staging: Staging::default(),
            last_merged: None,
        }
    }

    pub fn name(&self) -> &BranchName {
        &self.name
    }

    pub fn head(&self) -> &CommitId {
        &self.head
    }

    pub fn staging(&self) -> &Staging {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut Staging {
        &mut self.staging
    }

    pub fn last_merged(&self) -> Option<&BranchName> {
        self.last_merged.as_ref()
    }

    pub fn was_merged(&self) -> bool {
        self.last_merged.is_some()
    }

    /// move the head and drop all staged changes
    pub fn advance(&mut self, head: CommitId) {
        self.head = head;
        self.staging.clear();
    }

    pub fn record_merge(&mut self, from: BranchName) {
        self.last_merged = Some(from);
    }
}

/// Manages branch files and the current-branch pointer.
#[derive(Debug, Clone)]
pub struct RefManager {
    refs_dir: PathBuf,
    head_file: PathBuf,
}

impl RefManager {
    pub fn open(refs_dir: impl Into<PathBuf>, head_file: impl Into<PathBuf>) -> Self {
        Self {
            refs_dir: refs_dir.into(),
            head_file: head_file.into(),
        }
    }

    /// Create the refs directory, the first branch, and point HEAD at it.
    pub fn init(
        refs_dir: impl Into<PathBuf>,
        head_file: impl Into<PathBuf>,
        first: &Branch,
    ) -> StorageResult<Self> {
        let refs = Self::open(refs_dir, head_file);
        fs::create_dir_all(&refs.refs_dir)?;
        refs.save(first)?;
        refs.set_current(first.name())?;
        Ok(refs)
    }

    fn branch_path(&self, name: &BranchName) -> PathBuf {
        self.refs_dir.join(name.as_str())
    }

    /// Name of the checked-out branch.
    pub fn current_branch_name(&self) -> StorageResult<BranchName> {
        let raw = match fs::read_to_string(&self.head_file) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::corrupted(&self.head_file, "current branch pointer is missing"))
            }
            Err(e) => return Err(e.into()),
        };
        BranchName::new(raw.trim())
            .map_err(|e| StorageError::corrupted(&self.head_file, e.to_string()))
    }

    /// Load the checked-out branch. A dangling pointer is corruption.
    pub fn current_branch(&self) -> StorageResult<Branch> {
        let name = self.current_branch_name()?;
        self.load(&name).map_err(|e| match e {
            StorageError::RefNotFound(_) => StorageError::corrupted(
                self.branch_path(&name),
                format!("current branch '{}' has no branch file", name),
            ),
            other => other,
        })
    }

    pub fn set_current(&self, name: &BranchName) -> StorageResult<()> {
        write_atomic(&self.head_file, name.as_str().as_bytes())?;
        debug!(branch = %name, "switched current branch");
        Ok(())
    }

    /// Check if a branch exists.
    pub fn exists(&self, name: &BranchName) -> bool {
        self.branch_path(name).is_file()
    }

    /// Load a branch by name.
    pub fn load(&self, name: &BranchName) -> StorageResult<Branch> {
        let bytes = match fs::read(self.branch_path(name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::RefNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let branch: Branch = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::corrupted(self.branch_path(name), e.to_string()))?;
        if branch.name() != name {
            return Err(StorageError::corrupted(
                self.branch_path(name),
                format!("file records branch '{}'", branch.name()),
            ));
        }
        Ok(branch)
    }

    /// Rewrite a branch file in full.
    pub fn save(&self, branch: &Branch) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(branch)?;
        write_atomic(&self.branch_path(branch.name()), &bytes)?;
        debug!(branch = %branch.name(), head = %branch.head().short(), "saved branch");
        Ok(())
    }

    /// Create a new branch pointing to the given commit.
    pub fn create_branch(&self, name: BranchName, head: CommitId) -> StorageResult<Branch> {
        if self.exists(&name) {
            return Err(StorageError::BranchAlreadyExists(name.to_string()));
        }
        let branch = Branch::new(name, head);
        self.save(&branch)?;
        Ok(branch)
    }

    /// Delete a branch. The checked-out branch cannot be deleted.
    pub fn delete_branch(&self, name: &BranchName) -> StorageResult<()> {
        if !self.exists(name) {
            return Err(StorageError::RefNotFound(name.to_string()));
        }
        if &self.current_branch_name()? == name {
            return Err(StorageError::InvalidOperation(format!(
                "cannot delete the current branch '{}'",
                name
            )));
        }
        fs::remove_file(self.branch_path(name))?;
        debug!(branch = %name, "deleted branch");
        Ok(())
    }

    /// All branch names, sorted.
    pub fn list(&self) -> StorageResult<Vec<BranchName>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.refs_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str().and_then(|n| BranchName::new(n).ok()) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn refs_dir(&self) -> &Path {
        &self.refs_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::commit::Commit;
    use tempfile::TempDir;

    fn blob(content: &[u8]) -> BlobId {
        BlobId::for_content(content)
    }

    fn setup() -> (TempDir, RefManager) {
        let dir = TempDir::new().unwrap();
        let master = Branch::new(BranchName::master(), Commit::initial().id().clone());
        let refs = RefManager::init(dir.path().join("refs"), dir.path().join("HEAD"), &master).unwrap();
        (dir, refs)
    }

    #[test]
    fn test_staging_transitions() {
        let mut staging = Staging::default();
        staging.stage("a", blob(b"1"));
        assert!(staging.is_staged_for_addition("a"));

        // removal clears the staged addition
        staging.stage_removal("a", blob(b"0"));
        assert!(!staging.is_staged_for_addition("a"));
        assert!(staging.is_staged_for_removal("a"));

        // adding again clears the removal
        staging.stage("a", blob(b"2"));
        assert!(!staging.is_staged_for_removal("a"));
        assert_eq!(staging.additions().get("a"), Some(&blob(b"2")));

        staging.unstage("a");
        assert!(staging.is_empty());
    }

    #[test]
    fn test_apply_to_leaves_base_untouched() {
        let mut base = FileMap::new();
        base.insert("keep".to_string(), blob(b"k"));
        base.insert("gone".to_string(), blob(b"g"));
        base.insert("edit".to_string(), blob(b"old"));

        let mut staging = Staging::default();
        staging.stage("edit", blob(b"new"));
        staging.stage("fresh", blob(b"f"));
        staging.stage_removal("gone", blob(b"g"));

        let next = staging.apply_to(&base);
        assert_eq!(next.len(), 3);
        assert_eq!(next.get("edit"), Some(&blob(b"new")));
        assert_eq!(next.get("fresh"), Some(&blob(b"f")));
        assert!(!next.contains_key("gone"));

        assert_eq!(base.len(), 3);
        assert_eq!(base.get("edit"), Some(&blob(b"old")));
    }

    #[test]
    fn test_init_sets_current() {
        let (_dir, refs) = setup();
        assert_eq!(refs.current_branch_name().unwrap(), BranchName::master());
        let master = refs.current_branch().unwrap();
        assert_eq!(master.head(), Commit::initial().id());
        assert!(master.staging().is_empty());
        assert!(!master.was_merged());
    }

    #[test]
    fn test_branch_lifecycle() {
        let (_dir, refs) = setup();
        let head = Commit::initial().id().clone();
        let dev = BranchName::new("dev").unwrap();

        refs.create_branch(dev.clone(), head.clone()).unwrap();
        assert!(refs.exists(&dev));
        assert_eq!(refs.list().unwrap(), vec![dev.clone(), BranchName::master()]);

        let dup = refs.create_branch(dev.clone(), head);
        assert!(matches!(dup, Err(StorageError::BranchAlreadyExists(_))));

        refs.delete_branch(&dev).unwrap();
        assert!(!refs.exists(&dev));
        assert!(matches!(refs.delete_branch(&dev), Err(StorageError::RefNotFound(_))));
    }

    #[test]
    fn test_cannot_delete_current() {
        let (_dir, refs) = setup();
        let result = refs.delete_branch(&BranchName::master());
        assert!(matches!(result, Err(StorageError::InvalidOperation(_))));
        assert!(refs.exists(&BranchName::master()));
    }

    #[test]
    fn test_staging_persists() {
        let (_dir, refs) = setup();
        let mut master = refs.current_branch().unwrap();
        master.staging_mut().stage("wug.txt", blob(b"wug"));
        master.record_merge(BranchName::new("other").unwrap());
        refs.save(&master).unwrap();

        let reloaded = refs.current_branch().unwrap();
        assert_eq!(reloaded, master);
        assert_eq!(reloaded.last_merged().map(|b| b.as_str()), Some("other"));
    }

    #[test]
    fn test_advance_clears_staging() {
        let mut branch = Branch::new(BranchName::master(), Commit::initial().id().clone());
        branch.staging_mut().stage("a", blob(b"a"));
        let next = CommitId::from_hex(&"1".repeat(64)).unwrap();
        branch.advance(next.clone());
        assert_eq!(branch.head(), &next);
        assert!(branch.staging().is_empty());
    }

    #[test]
    fn test_missing_pointer_is_corruption() {
        let (dir, refs) = setup();
        fs::remove_file(dir.path().join("HEAD")).unwrap();
        assert!(matches!(refs.current_branch(), Err(StorageError::CorruptedData { .. })));
    }

    #[test]
    fn test_dangling_pointer_is_corruption() {
        let (_dir, refs) = setup();
        refs.set_current(&BranchName::new("ghost").unwrap()).unwrap();
        assert!(matches!(refs.current_branch(), Err(StorageError::CorruptedData { .. })));
    }

    #[test]
    fn test_damaged_head_is_corruption() {
        let (dir, refs) = setup();
        fs::write(
            dir.path().join("refs").join("master"),
            r#"{"name":"master","head":"abc"}"#,
        )
        .unwrap();
        let err = refs.current_branch().unwrap_err();
        assert!(err.is_corruption(), "{}", err);
    }
}
