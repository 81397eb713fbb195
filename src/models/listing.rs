//! Entries of a synthetic directory view.

use chrono::{DateTime, Utc};
use std::fmt;

/// Size column of a directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntrySize {
    Bytes(u64),
    /// A deeper prefix, shown as `-`.
    Directory,
}

impl fmt::Display for EntrySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySize::Bytes(n) => write!(f, "{}", n),
            EntrySize::Directory => f.write_str("-"),
        }
    }
}

/// One immediate child of a listed prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Single path segment, with a trailing `/` for sub-prefixes.
    pub name: String,

    /// Creation time of the object; `None` for sub-prefixes.
    pub modified: Option<DateTime<Utc>>,

    pub size: EntrySize,
}

impl DirectoryEntry {
    pub fn is_directory(&self) -> bool {
        self.size == EntrySize::Directory
    }
}
