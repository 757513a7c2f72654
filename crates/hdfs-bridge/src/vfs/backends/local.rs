//! Local filesystem backend.
//!
//! Provides access to real filesystem paths, with path security
//! to prevent escaping the root directory.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::constants::DEFAULT_CHUNK_SIZE;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{ByteStream, VfsOps};
use crate::vfs::types::{DirEntry, FileStat, FileType};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/project`, then `stat("/src/main.rs")` stats
/// `/home/amy/project/src/main.rs`. The bridge uses `/` as the root so
/// `local://` identifiers address the whole disk.
///
/// Path security is enforced: attempts to escape via `..` are blocked.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    chunk_size: usize,
}

impl LocalBackend {
    /// Create a new local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the chunk size used for read streams.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a backend path to an absolute path within the root.
    ///
    /// Returns an error if the path escapes the root (via `..`).
    fn resolve(&self, path: &str) -> VfsResult<PathBuf> {
        let rel = path.trim_start_matches('/');
        if rel.is_empty() {
            return Ok(self.root.clone());
        }

        let full = self.root.join(rel);

        // Canonicalize to resolve symlinks and `..`.
        // For non-existent paths, canonicalize the parent and append the name.
        let canonical = if full.exists() {
            dunce::canonicalize(&full)?
        } else {
            let parent = full
                .parent()
                .ok_or_else(|| VfsError::invalid_path(path))?;
            let filename = full
                .file_name()
                .ok_or_else(|| VfsError::invalid_path(path))?;

            if parent.exists() {
                dunce::canonicalize(parent)?.join(filename)
            } else {
                // Parent doesn't exist, the operation itself will fail
                full
            }
        };

        if !canonical.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }

        Ok(canonical)
    }

    /// Convert std::fs::Metadata to FileStat.
    fn metadata_to_stat(meta: &std::fs::Metadata) -> FileStat {
        let kind = if meta.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        };
        let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);

        FileStat {
            size: if meta.is_dir() { 0 } else { meta.len() },
            created: meta.created().unwrap_or(modified),
            modified,
            kind,
        }
    }
}

#[async_trait]
impl VfsOps for LocalBackend {
    async fn stat(&self, path: &str) -> VfsResult<FileStat> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::not_found(path),
            _ => VfsError::from(e),
        })?;
        Ok(Self::metadata_to_stat(&meta))
    }

    async fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::not_found(path),
            _ => VfsError::from(e),
        })?;
        if !meta.is_dir() {
            return Err(VfsError::not_a_directory(path));
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full_path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let mut file_type = entry.file_type().await?;
            if file_type.is_symlink() {
                // Classify by target; dangling links count as files
                if let Ok(meta) = fs::metadata(entry.path()).await {
                    file_type = meta.file_type();
                }
            }
            let kind = if file_type.is_dir() {
                FileType::Directory
            } else {
                FileType::File
            };

            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        let full_path = self.resolve(path)?;
        fs::create_dir(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => VfsError::AlreadyExists {
                path: path.to_string(),
                kind: None,
            },
            std::io::ErrorKind::NotFound => VfsError::not_found(path),
            _ => VfsError::from(e),
        })
    }

    async fn delete(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let full_path = self.resolve(path)?;
        if full_path == self.root {
            return Err(VfsError::invalid_path("refusing to delete the backend root"));
        }
        let meta = fs::symlink_metadata(&full_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => VfsError::not_found(path),
                _ => VfsError::from(e),
            })?;

        if meta.is_dir() {
            if recursive {
                fs::remove_dir_all(&full_path).await?;
            } else {
                fs::remove_dir(&full_path).await.map_err(|e| {
                    match e.kind() {
                        std::io::ErrorKind::DirectoryNotEmpty => {
                            VfsError::directory_not_empty(path)
                        }
                        _ => VfsError::from(e),
                    }
                })?;
            }
        } else {
            fs::remove_file(&full_path).await?;
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;

        fs::rename(&from_path, &to_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => VfsError::not_found(from),
                _ => VfsError::from(e),
            })
    }

    async fn open_read(&self, path: &str) -> VfsResult<ByteStream> {
        let full_path = self.resolve(path)?;
        let file = fs::File::open(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::not_found(path),
            _ => VfsError::from(e),
        })?;
        Ok(Box::pin(ReaderStream::with_capacity(file, self.chunk_size)))
    }

    async fn write_from(
        &self,
        path: &str,
        mut body: ByteStream,
        overwrite: bool,
    ) -> VfsResult<u64> {
        let full_path = self.resolve(path)?;

        let mut options = fs::OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = options.open(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => VfsError::already_exists(path, FileType::File),
            std::io::ErrorKind::NotFound => VfsError::not_found(path),
            _ => VfsError::from(e),
        })?;

        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}
