//! Whole-file replacement for metadata writes.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::storage::error::{StorageError, StorageResult};

/// write `bytes` to `path` by renaming a sibling temp file over it
///
/// readers see either the old content or the new content, never a torn file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StorageError::Internal(format!("no parent directory for {}", path.display())))?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}
