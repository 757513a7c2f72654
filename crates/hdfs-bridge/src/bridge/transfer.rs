//! Transfer engine: read, write and copy.
//!
//! Each streaming call runs in its own [`TransferSession`]. Stream
//! stages are attached with `session.track(..)` and owned by the future
//! passed to `session.run(..)`, so they are dropped (and their handles
//! closed) before any result reaches the caller.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::future::BoxFuture;
use tracing::{debug, instrument, warn};

use super::Bridge;
use crate::constants::READ_PREALLOC_LIMIT;
use crate::events::FsEvent;
use crate::session::{TransferOptions, TransferSession};
use crate::uri::ResourceId;
use crate::vfs::{FileType, VfsError, VfsOps, VfsResult, chunked_stream};

/// Flags for [`Bridge::write_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create the file if it does not exist.
    pub create: bool,
    /// Replace an existing file.
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            create: true,
            overwrite: false,
        }
    }
}

/// How a copy proceeds, given what exists at source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPlan {
    /// Stream one file to a missing or existing file.
    FileToFile,
    /// Append the source name to the directory, then file to file.
    FileIntoDirectory,
    /// Append the source name to the directory, then directory to new.
    DirectoryIntoDirectory,
    /// Create the destination and copy each child into it.
    DirectoryToNew,
}

impl CopyPlan {
    /// `None` when a directory would land on an existing file.
    pub fn classify(source: FileType, destination: Option<FileType>) -> Option<Self> {
        match (source, destination) {
            (FileType::File, None | Some(FileType::File)) => Some(Self::FileToFile),
            (FileType::File, Some(FileType::Directory)) => Some(Self::FileIntoDirectory),
            (FileType::Directory, Some(FileType::Directory)) => Some(Self::DirectoryIntoDirectory),
            (FileType::Directory, None) => Some(Self::DirectoryToNew),
            (FileType::Directory, Some(FileType::File)) => None,
        }
    }
}

/// `Some(kind)` if `id` exists, `None` if it does not.
async fn kind_of(backend: &dyn VfsOps, id: &ResourceId) -> VfsResult<Option<FileType>> {
    match backend.stat(id.path()).await {
        Ok(stat) => Ok(Some(stat.kind)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

impl Bridge {
    // ========================================================================
    // Read
    // ========================================================================

    /// Read a whole file.
    ///
    /// Directories fail with `IsADirectory` before any stream is opened.
    #[instrument(skip(self, opts), fields(id = %id))]
    pub async fn read_file(&self, id: &ResourceId, opts: &TransferOptions) -> VfsResult<Bytes> {
        let backend = self.backend(id)?;
        let stat = backend.stat(id.path()).await?;
        if stat.is_dir() {
            return Err(VfsError::is_a_directory(id.to_string()));
        }

        let session = TransferSession::new(format!("Reading {}", id.base_name()), stat.size, opts);
        let data = session
            .run(async {
                let mut stream = session.track(backend.open_read(id.path()).await?);
                let mut buf = BytesMut::with_capacity(stat.size.min(READ_PREALLOC_LIMIT) as usize);
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok::<_, VfsError>(buf.freeze())
            })
            .await?;

        debug!(bytes = data.len(), "read complete");
        Ok(data)
    }

    // ========================================================================
    // Write
    // ========================================================================

    /// Write `content` to a file, creating missing parent directories.
    ///
    /// - existing directory: `IsADirectory`
    /// - existing file without `overwrite`: `AlreadyExists`
    /// - missing file without `create`: `NotFound`
    #[instrument(skip(self, content, opts), fields(id = %id, bytes = content.len()))]
    pub async fn write_file(
        &self,
        id: &ResourceId,
        content: Bytes,
        options: WriteOptions,
        opts: &TransferOptions,
    ) -> VfsResult<()> {
        let backend = self.backend(id)?;
        let existed = match kind_of(backend.as_ref(), id).await? {
            Some(FileType::Directory) => return Err(VfsError::is_a_directory(id.to_string())),
            Some(FileType::File) if !options.overwrite => {
                return Err(VfsError::already_exists(id.to_string(), FileType::File));
            }
            Some(FileType::File) => true,
            None if !options.create => return Err(VfsError::not_found(id.to_string())),
            None => false,
        };
        if let Some(parent) = id.parent() {
            self.ensure_directory(backend.as_ref(), &parent).await?;
        }

        let total = content.len() as u64;
        let session = TransferSession::new(format!("Writing {}", id.base_name()), total, opts);
        let written = session
            .run(async {
                let body = session.track(chunked_stream(content, self.chunk_size));
                backend.write_from(id.path(), body, options.overwrite).await
            })
            .await?;

        debug!(written, "write complete");
        self.events.publish(if existed {
            FsEvent::Changed(id.clone())
        } else {
            FsEvent::Created(id.clone())
        });
        Ok(())
    }

    // ========================================================================
    // Copy
    // ========================================================================

    /// Copy a file or directory tree, across any pair of backends.
    ///
    /// Copying into an existing directory places the source under it by
    /// name: `/src` into existing `/dst` yields `/dst/src`.
    #[instrument(skip(self, opts), fields(source = %source, destination = %destination))]
    pub async fn copy(
        &self,
        source: &ResourceId,
        destination: &ResourceId,
        overwrite: bool,
        opts: &TransferOptions,
    ) -> VfsResult<ResourceId> {
        let target = self.copy_resolved(source, destination, overwrite, opts).await?;
        self.events.publish(FsEvent::Created(target.clone()));
        Ok(target)
    }

    /// Classify and run a copy. Returns the top-level resource written.
    pub(crate) async fn copy_resolved(
        &self,
        source: &ResourceId,
        destination: &ResourceId,
        overwrite: bool,
        opts: &TransferOptions,
    ) -> VfsResult<ResourceId> {
        let src_kind = self.backend(source)?.stat(source.path()).await?.kind;
        let dst_kind = kind_of(self.backend(destination)?.as_ref(), destination).await?;
        let plan = CopyPlan::classify(src_kind, dst_kind)
            .ok_or_else(|| VfsError::not_a_directory(destination.to_string()))?;
        debug!(?plan, "copy");

        match plan {
            CopyPlan::FileToFile => {
                self.copy_file(source, destination, overwrite, opts).await?;
                Ok(destination.clone())
            }
            CopyPlan::FileIntoDirectory => {
                let target = destination.join(source.base_name());
                self.copy_file(source, &target, overwrite, opts).await?;
                Ok(target)
            }
            CopyPlan::DirectoryIntoDirectory => {
                let target = destination.join(source.base_name());
                self.copy_directory(source, &target, overwrite, opts).await?;
                Ok(target)
            }
            CopyPlan::DirectoryToNew => {
                self.copy_directory(source, destination, overwrite, opts)
                    .await?;
                Ok(destination.clone())
            }
        }
    }

    /// Stream one file from `source` to `destination`.
    async fn copy_file(
        &self,
        source: &ResourceId,
        destination: &ResourceId,
        overwrite: bool,
        opts: &TransferOptions,
    ) -> VfsResult<()> {
        if source == destination {
            return Err(VfsError::invalid_path(format!("cannot copy {source} onto itself")));
        }
        let src_backend = self.backend(source)?;
        let dst_backend = self.backend(destination)?;

        let stat = src_backend.stat(source.path()).await?;
        if stat.is_dir() {
            return Err(VfsError::is_a_directory(source.to_string()));
        }
        match kind_of(dst_backend.as_ref(), destination).await? {
            Some(FileType::Directory) => {
                return Err(VfsError::is_a_directory(destination.to_string()));
            }
            Some(FileType::File) if !overwrite => {
                return Err(VfsError::already_exists(destination.to_string(), FileType::File));
            }
            Some(FileType::File) => {}
            None => {
                if let Some(parent) = destination.parent() {
                    self.ensure_directory(dst_backend.as_ref(), &parent).await?;
                }
            }
        }

        let session = TransferSession::new(format!("Copying {}", source.base_name()), stat.size, opts);
        let written = session
            .run(async {
                let body = session.track(src_backend.open_read(source.path()).await?);
                dst_backend.write_from(destination.path(), body, overwrite).await
            })
            .await?;

        debug!(source = %source, destination = %destination, bytes = written, "copied file");
        Ok(())
    }

    /// Create `destination` and copy every child of `source` into it.
    ///
    /// Children are copied one at a time, each exactly once. A failed
    /// child does not stop its siblings; the first failure is returned
    /// once all have been tried. Cancellation stops immediately.
    fn copy_directory<'a>(
        &'a self,
        source: &'a ResourceId,
        destination: &'a ResourceId,
        overwrite: bool,
        opts: &'a TransferOptions,
    ) -> BoxFuture<'a, VfsResult<()>> {
        Box::pin(async move {
            if source.contains(destination) {
                return Err(VfsError::invalid_path(format!(
                    "cannot copy {source} into itself ({destination})"
                )));
            }
            let src_backend = self.backend(source)?;
            let dst_backend = self.backend(destination)?;

            self.ensure_directory(dst_backend.as_ref(), destination).await?;
            let children = src_backend.read_dir(source.path()).await?;

            let mut first_error = None;
            for child in children {
                if opts.is_cancelled() {
                    return Err(VfsError::Cancelled);
                }
                let from = source.join(&child.name);
                let to = destination.join(&child.name);
                let result = match child.kind {
                    FileType::File => self.copy_file(&from, &to, overwrite, opts).await,
                    FileType::Directory => self.copy_directory(&from, &to, overwrite, opts).await,
                };
                match result {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => {
                        warn!(source = %from, error = %e, "child copy failed");
                        first_error.get_or_insert(e);
                    }
                }
            }

            match first_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }
}
