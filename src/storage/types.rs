//! core type-safe wrappers around the storage primitives.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// length of a full hex digest
pub const DIGEST_HEX_LEN: usize = 64;

/// SHA-256 of `bytes`, lowercase hex
pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn is_hex_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// This makes sure we don't accidentally pass a blob ID where a commit ID
/// is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    pub(crate) fn new(hex: String) -> Self {
        Self(hex)
    }

    /// parse CommitId from a full hex string
    pub fn from_hex(hex: &str) -> Result<Self, InvalidNameError> {
        let lower = hex.to_ascii_lowercase();
        if !is_hex_digest(&lower) {
            return Err(InvalidNameError::InvalidDigest(hex.to_string()));
        }
        Ok(Self(lower))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// short form of the commit ID
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl TryFrom<String> for CommitId {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<CommitId> for String {
    fn from(value: CommitId) -> Self {
        value.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content digest of a stored file version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    /// digest the given content
    pub fn for_content(bytes: &[u8]) -> Self {
        Self(hex_digest(bytes))
    }

    pub fn from_hex(hex: &str) -> Result<Self, InvalidNameError> {
        let lower = hex.to_ascii_lowercase();
        if !is_hex_digest(&lower) {
            return Err(InvalidNameError::InvalidDigest(hex.to_string()));
        }
        Ok(Self(lower))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// tracked path -> blob digest
///
/// BTreeMap keeps the id preimage and all listings in path order.
pub type FileMap = BTreeMap<String, BlobId>;

/// A validated branch name.
///
/// Branch names double as file names under the refs directory, so they
/// cannot contain path separators or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// the branch created by `init`
    pub const MASTER: &'static str = "master";

    /// create a new BranchName, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if name.len() > 128 {
            return Err(InvalidNameError::TooLong(name.len()));
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err(InvalidNameError::InvalidStart(name.chars().next().unwrap_or('.')));
        }
        for (i, c) in name.chars().enumerate() {
            if c == '/' || c == '\\' || c.is_whitespace() || c.is_control() {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }
        Ok(Self(name))
    }

    pub fn master() -> Self {
        Self(Self::MASTER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BranchName> for String {
    fn from(value: BranchName) -> Self {
        value.0
    }
}

/// Validate a working-tree file name.
///
/// The working tree is flat: tracked paths are plain names in the
/// repository root.
pub fn validate_file_name(name: &str) -> Result<(), InvalidNameError> {
    if name.is_empty() {
        return Err(InvalidNameError::Empty);
    }
    if name == "." || name == ".." {
        return Err(InvalidNameError::InvalidPath(name.to_string()));
    }
    for (i, c) in name.chars().enumerate() {
        if c == '/' || c == '\\' || c == '\0' {
            return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
        }
    }
    Ok(())
}

/// error type for invalid names (branches, paths, digests)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidStart(char),
    InvalidCharacter { char: char, position: usize },
    InvalidPath(String),
    InvalidDigest(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidStart(c) => write!(f, "name cannot start with '{}'", c),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character {:?} at position {}", char, position)
            }
            Self::InvalidPath(path) => write!(f, "invalid path: '{}'", path),
            Self::InvalidDigest(hex) => write!(f, "not a full hex digest: '{}'", hex),
        }
    }
}

impl std::error::Error for InvalidNameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_id_is_deterministic() {
        let a = BlobId::for_content(b"hello");
        let b = BlobId::for_content(b"hello");
        let c = BlobId::for_content(b"hello\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), DIGEST_HEX_LEN);
        assert_eq!(
            a.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_commit_id_parsing() {
        let hex = "A".repeat(DIGEST_HEX_LEN);
        let id = CommitId::from_hex(&hex).unwrap();
        assert_eq!(id.as_str(), "a".repeat(DIGEST_HEX_LEN));
        assert_eq!(id.short(), "aaaaaaa");

        assert!(CommitId::from_hex("abc").is_err());
        assert!(CommitId::from_hex(&"g".repeat(DIGEST_HEX_LEN)).is_err());
    }

    #[test]
    fn test_commit_id_serde_validates() {
        let hex = "b".repeat(DIGEST_HEX_LEN);
        let id: CommitId = serde_json::from_str(&format!("\"{}\"", hex)).unwrap();
        assert_eq!(id.as_str(), hex);
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{}\"", hex));

        assert!(serde_json::from_str::<CommitId>("\"abc\"").is_err());
        assert!(serde_json::from_str::<CommitId>("\"\"").is_err());
    }

    #[test]
    fn test_branch_name_valid() {
        assert!(BranchName::new("master").is_ok());
        assert!(BranchName::new("feature-1").is_ok());
        assert!(BranchName::new("fix_bug.2").is_ok());
    }

    #[test]
    fn test_branch_name_invalid() {
        assert!(BranchName::new("").is_err());
        assert!(BranchName::new("a/b").is_err());
        assert!(BranchName::new("has space").is_err());
        assert!(BranchName::new(".hidden").is_err());
        assert!(BranchName::new("-flag").is_err());
        assert!(BranchName::new("x".repeat(129)).is_err());
    }

    #[test]
    fn test_branch_name_serde_validates() {
        let ok: BranchName = serde_json::from_str("\"dev\"").unwrap();
        assert_eq!(ok.as_str(), "dev");
        assert!(serde_json::from_str::<BranchName>("\"a/b\"").is_err());
    }

    #[test]
    fn test_file_name_validation() {
        assert!(validate_file_name("wug.txt").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("dir/file").is_err());
    }
}
