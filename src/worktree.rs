//! The working directory the user edits.
//!
//! Tracked paths are plain file names in the repository root; the metadata
//! directory and any subdirectories are invisible here.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::storage::{validate_file_name, InvalidNameError};

#[derive(Debug, Clone)]
pub struct WorkTree {
    root: PathBuf,
}

impl WorkTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate a user-supplied path before touching the filesystem.
    pub fn check_name(name: &str) -> Result<(), InvalidNameError> {
        validate_file_name(name)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// true if `name` is a regular file
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    pub fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path(name))
    }

    /// Read `name` if it is a regular file.
    pub fn read_if_exists(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        if !self.exists(name) {
            return Ok(None);
        }
        match fs::read(self.path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.path(name), bytes)
    }

    /// Delete `name` if it is a regular file. Returns whether anything was removed.
    pub fn delete(&self, name: &str) -> io::Result<bool> {
        if !self.exists(name) {
            return Ok(false);
        }
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Names of all regular files in the root, sorted.
    pub fn list_files(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // non-UTF-8 names cannot be tracked
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
