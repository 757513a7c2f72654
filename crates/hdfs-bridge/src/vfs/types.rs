//! Core VFS types.
//!
//! Both the local disk and the remote store normalize into these shapes,
//! so callers never see backend-specific metadata.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Normalized stat result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Creation time. Backends without one report the modification time.
    pub created: SystemTime,
    /// Last modification time.
    pub modified: SystemTime,
    /// File type.
    pub kind: FileType,
}

impl FileStat {
    /// Stat for a file of `size` bytes, timestamped now.
    pub fn file(size: u64) -> Self {
        let now = SystemTime::now();
        Self {
            size,
            created: now,
            modified: now,
            kind: FileType::File,
        }
    }

    /// Stat for a directory, timestamped now.
    pub fn directory() -> Self {
        let now = SystemTime::now();
        Self {
            size: 0,
            created: now,
            modified: now,
            kind: FileType::Directory,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}
