//! VFS error types.

use std::io;
use thiserror::Error;

use super::types::FileType;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists. `kind` is set when the existing entry was stat'ed.
    #[error("already exists: {path}")]
    AlreadyExists {
        path: String,
        kind: Option<FileType>,
    },

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty (non-recursive delete).
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// No cluster descriptor matches the authority.
    #[error("no cluster configuration for {0}")]
    MissingConfiguration(String),

    /// A client for the authority could not be constructed.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Transport or HTTP failure, message kept verbatim.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Path escapes root (security violation).
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid path or resource identifier.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Anything that fits nowhere else.
    #[error("{0}")]
    Unknown(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error for an entry of known kind.
    pub fn already_exists(path: impl Into<String>, kind: FileType) -> Self {
        Self::AlreadyExists {
            path: path.into(),
            kind: Some(kind),
        }
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a Protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an Unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Configuration problems are not transient and should not be retried.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingConfiguration(_) | Self::Unavailable(_))
    }

    /// Cancellation is a user action, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<io::Error> for VfsError {
    fn from(e: io::Error) -> Self {
        let msg = e.to_string();
        match e.kind() {
            io::ErrorKind::NotFound => VfsError::NotFound(msg),
            io::ErrorKind::AlreadyExists => VfsError::AlreadyExists {
                path: msg,
                kind: None,
            },
            io::ErrorKind::IsADirectory => VfsError::IsADirectory(msg),
            io::ErrorKind::NotADirectory => VfsError::NotADirectory(msg),
            io::ErrorKind::DirectoryNotEmpty => VfsError::DirectoryNotEmpty(msg),
            _ => VfsError::Io(e),
        }
    }
}

impl From<reqwest::Error> for VfsError {
    fn from(e: reqwest::Error) -> Self {
        VfsError::Protocol(e.to_string())
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists { path, .. } => {
                io::Error::new(io::ErrorKind::AlreadyExists, path)
            }
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            VfsError::PathEscapesRoot(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::Cancelled => io::Error::new(io::ErrorKind::Interrupted, "operation cancelled"),
            VfsError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
