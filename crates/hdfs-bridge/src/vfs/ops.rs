//! VFS operations trait.
//!
//! This trait defines the per-backend filesystem operations. Paths are
//! absolute, slash-separated strings in the backend's own namespace
//! (`/` is the backend root).

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::io;
use std::pin::Pin;

use super::types::{DirEntry, FileStat};
use super::VfsResult;

/// A stream of byte chunks, in source order.
///
/// Dropping the stream closes whatever handle backs it (file descriptor,
/// HTTP connection).
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Core VFS operations trait.
///
/// Implemented by the local disk backend, the in-memory backend and the
/// WebHDFS client. Recursion (implicit parent creation, directory copy)
/// lives above this trait; backends only do single-step operations.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Metadata
    // ========================================================================

    /// Get normalized file metadata. Missing entries are `NotFound`.
    async fn stat(&self, path: &str) -> VfsResult<FileStat>;

    /// List the immediate children of a directory.
    async fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>>;

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Create a single directory.
    async fn mkdir(&self, path: &str) -> VfsResult<()>;

    /// Delete a file or directory.
    ///
    /// Deleting a non-empty directory without `recursive` fails with
    /// `DirectoryNotEmpty`.
    async fn delete(&self, path: &str, recursive: bool) -> VfsResult<()>;

    /// Rename within this backend in one protocol call.
    async fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    // ========================================================================
    // Streaming
    // ========================================================================

    /// Open a read stream over the whole file.
    async fn open_read(&self, path: &str) -> VfsResult<ByteStream>;

    /// Create (or truncate, when `overwrite`) a file and fill it from `body`.
    ///
    /// Returns the number of bytes written. An error item from `body`
    /// aborts the write and is returned as-is.
    async fn write_from(&self, path: &str, body: ByteStream, overwrite: bool) -> VfsResult<u64>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists. Errors other than `NotFound` propagate.
    async fn exists(&self, path: &str) -> VfsResult<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Build a [`ByteStream`] from an in-memory buffer.
pub fn byte_stream_from(data: impl Into<Bytes>) -> ByteStream {
    let data: Bytes = data.into();
    Box::pin(futures::stream::once(async move { Ok::<_, io::Error>(data) }))
}

/// Split an in-memory buffer into a [`ByteStream`] of `chunk_size` slices.
///
/// Slicing shares the buffer; no bytes are copied.
pub fn chunked_stream(data: Bytes, chunk_size: usize) -> ByteStream {
    let chunk_size = chunk_size.max(1);
    let chunks: Vec<io::Result<Bytes>> = (0..data.len())
        .step_by(chunk_size)
        .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
        .collect();
    Box::pin(futures::stream::iter(chunks))
}
