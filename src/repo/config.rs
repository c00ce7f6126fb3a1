//! Repository configuration.

use std::path::{Path, PathBuf};

use crate::storage::BranchName;

/// Repository configuration options.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Working directory the repository tracks.
    pub work_dir: PathBuf,
    /// Name of the metadata directory inside `work_dir`.
    pub meta_dir_name: String,
    /// Branch created by `init`.
    pub default_branch: BranchName,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            meta_dir_name: ".gitlite".to_string(),
            default_branch: BranchName::master(),
        }
    }
}

impl RepositoryConfig {
    /// Create a new configuration for the given working directory.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Default::default()
        }
    }

    /// Set the metadata directory name.
    pub fn meta_dir_name(mut self, name: impl Into<String>) -> Self {
        self.meta_dir_name = name.into();
        self
    }

    /// Set the branch `init` creates.
    pub fn default_branch(mut self, branch: BranchName) -> Self {
        self.default_branch = branch;
        self
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.work_dir.join(&self.meta_dir_name)
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.meta_dir().join("objects")
    }

    pub fn refs_dir(&self) -> PathBuf {
        self.meta_dir().join("refs")
    }

    pub fn head_file(&self) -> PathBuf {
        self.meta_dir().join("HEAD")
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}
