//! Virtual Filesystem abstraction.
//!
//! Key components:
//!
//! - [`VfsOps`] - Per-backend filesystem operations
//! - [`LocalBackend`] - Local disk access (with path security)
//! - [`MemoryBackend`] - In-memory filesystem (for testing, scratch remotes)
//! - [`WebHdfsClient`] - Remote store client over the WebHDFS REST API
//!
//! ## Design Decisions
//!
//! - **Path-based**: Operations take absolute slash-separated paths in
//!   the backend's own namespace.
//! - **Streams, not offsets**: Reads hand out a chunk stream and writes
//!   consume one, so a copy between any two backends is a single pipe.
//! - **Single-step backends**: Recursion and fallback policy live in the
//!   bridge, not here.

pub mod backends;
mod error;
mod ops;
mod types;

pub use backends::{LocalBackend, MemoryBackend, WebHdfsClient, WebHdfsConfig};
pub use error::{VfsError, VfsResult};
pub use ops::{ByteStream, VfsOps, byte_stream_from, chunked_stream};
pub use types::{DirEntry, FileStat, FileType};
