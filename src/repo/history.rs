//! Log entries for `log` and `global-log`.

use std::fmt;

use chrono::{DateTime, Local, Utc};

use crate::storage::{Commit, CommitId};

/// Display format of commit dates, e.g. `Thu Jan 1 00:00:00 1970 +0000`.
pub const DATE_FORMAT: &str = "%a %b %-d %H:%M:%S %Y %z";

/// Information about a commit in history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: CommitId,
    pub parents: Vec<CommitId>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn from_commit(commit: &Commit) -> Self {
        Self {
            id: commit.id().clone(),
            parents: commit.parents().to_vec(),
            timestamp: commit.timestamp(),
            message: commit.message().to_string(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===")?;
        writeln!(f, "commit {}", self.id)?;
        if let [first, second] = self.parents.as_slice() {
            writeln!(f, "Merge: {} {}", first.short(), second.short())?;
        }
        writeln!(
            f,
            "Date: {}",
            self.timestamp.with_timezone(&Local).format(DATE_FORMAT)
        )?;
        writeln!(f, "{}", self.message)?;
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CommitBuilder;

    #[test]
    fn test_plain_entry() {
        let entry = LogEntry::from_commit(&Commit::initial());
        let text = entry.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "===");
        assert_eq!(lines[1], format!("commit {}", Commit::initial().id()));
        assert!(lines[2].starts_with("Date: "));
        assert_eq!(lines[3], "initial commit");
        assert_eq!(lines[4], "");
        assert!(!text.contains("Merge:"));
    }

    #[test]
    fn test_merge_entry() {
        let root = Commit::initial();
        let side = CommitBuilder::new()
            .parent(root.id().clone())
            .message("side")
            .build()
            .unwrap();
        let merge = CommitBuilder::new()
            .parents(vec![root.id().clone(), side.id().clone()])
            .message("Merged side into master.")
            .build()
            .unwrap();

        let text = LogEntry::from_commit(&merge).to_string();
        let expected = format!("Merge: {} {}\n", root.id().short(), side.id().short());
        assert!(text.contains(&expected));
    }
}
