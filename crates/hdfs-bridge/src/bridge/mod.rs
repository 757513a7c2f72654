//! The filesystem bridge.
//!
//! [`Bridge`] is the one entry point callers use. It resolves a
//! [`ResourceId`] to a backend (the local disk, or the registered remote
//! client for the id's authority) and layers the policy the backends do
//! not carry:
//!
//! - directory creation is implicitly recursive
//! - rename takes a single protocol call when source and target share a
//!   parent, and falls back to copy-then-delete otherwise
//! - read/write/copy run inside a [`TransferSession`](crate::session::TransferSession)
//!   with progress and cancellation (see `transfer.rs`)
//! - every successful mutation publishes an [`FsEvent`]
//!
//! ## Known limitation
//!
//! The rename fallback is not atomic. If the process dies between the
//! copy and the delete, both copies remain.

mod transfer;

#[cfg(test)]
mod tests;

pub use transfer::{CopyPlan, WriteOptions};

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::BridgeConfig;
use crate::constants::DEFAULT_CHUNK_SIZE;
use crate::events::{EventBus, FsEvent, Subscription, WatchHandle};
use crate::registry::ClientRegistry;
use crate::session::TransferOptions;
use crate::uri::{ResourceId, Scheme};
use crate::vfs::{DirEntry, FileStat, FileType, LocalBackend, VfsError, VfsOps, VfsResult};

/// Uniform filesystem operations over local disk and remote clusters.
pub struct Bridge {
    local: Arc<dyn VfsOps>,
    registry: Arc<ClientRegistry>,
    events: EventBus,
    /// Chunk size used when streaming an in-memory buffer to a backend.
    chunk_size: usize,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.registry)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    pub fn new(local: Arc<dyn VfsOps>, registry: Arc<ClientRegistry>, events: EventBus) -> Self {
        Self {
            local,
            registry,
            events,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Local disk at `local_root`, WebHDFS clients for the configured clusters.
    pub fn from_config(config: &BridgeConfig) -> Self {
        let local = LocalBackend::new(config.local_root.clone()).with_chunk_size(config.chunk_size);
        let registry = ClientRegistry::new(
            Arc::new(config.clone()),
            Arc::new(config.client_factory()),
        );
        Self::new(
            Arc::new(local),
            Arc::new(registry),
            EventBus::new(config.event_capacity),
        )
        .with_chunk_size(config.chunk_size)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to change events (`fs.created`, `fs.*`, `fs.>`).
    pub fn subscribe(&self, pattern: &str) -> Subscription {
        self.events.subscribe(pattern)
    }

    /// Placeholder for external change notification; never fires.
    pub fn watch(&self, id: &ResourceId) -> WatchHandle {
        self.events.watch(id)
    }

    /// The backend serving `id`.
    pub fn backend(&self, id: &ResourceId) -> VfsResult<Arc<dyn VfsOps>> {
        match id.scheme() {
            Scheme::Local => Ok(Arc::clone(&self.local)),
            Scheme::Remote => self.registry.get_client(id.authority()),
        }
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub async fn stat(&self, id: &ResourceId) -> VfsResult<FileStat> {
        self.backend(id)?.stat(id.path()).await
    }

    pub async fn exists(&self, id: &ResourceId) -> VfsResult<bool> {
        self.backend(id)?.exists(id.path()).await
    }

    /// Immediate children as `(name, kind)`.
    pub async fn read_directory(&self, id: &ResourceId) -> VfsResult<Vec<DirEntry>> {
        self.backend(id)?.read_dir(id.path()).await
    }

    // ========================================================================
    // Tree mutation
    // ========================================================================

    /// Create a directory and any missing ancestors.
    ///
    /// Succeeds if the directory already exists. Fails with
    /// `AlreadyExists(kind=File)` if a file is in the way.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn create_directory(&self, id: &ResourceId) -> VfsResult<()> {
        let backend = self.backend(id)?;
        if self.ensure_directory(backend.as_ref(), id).await? {
            self.events.publish(FsEvent::Created(id.clone()));
        }
        Ok(())
    }

    /// Make sure `id` is a directory on `backend`. Returns true if
    /// anything was created. Publishes nothing.
    pub(crate) async fn ensure_directory(
        &self,
        backend: &dyn VfsOps,
        id: &ResourceId,
    ) -> VfsResult<bool> {
        if id.is_root() {
            return Ok(false);
        }

        // Walk up until an existing directory, then create top-down.
        let mut missing = Vec::new();
        let mut cursor = Some(id.clone());
        while let Some(dir) = cursor.take() {
            if dir.is_root() {
                break;
            }
            match backend.stat(dir.path()).await {
                Ok(stat) if stat.is_dir() => break,
                Ok(_) => return Err(VfsError::already_exists(dir.to_string(), FileType::File)),
                Err(e) if e.is_not_found() => {
                    cursor = dir.parent();
                    missing.push(dir);
                }
                Err(e) => return Err(e),
            }
        }

        let created = !missing.is_empty();
        for dir in missing.iter().rev() {
            match backend.mkdir(dir.path()).await {
                Ok(()) => debug!(path = dir.path(), "created directory"),
                // Lost a race with another creator.
                Err(VfsError::AlreadyExists { .. }) => {
                    if !backend.stat(dir.path()).await?.is_dir() {
                        return Err(VfsError::already_exists(dir.to_string(), FileType::File));
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    /// Delete a file or directory. Non-empty directories need `recursive`.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: &ResourceId, recursive: bool) -> VfsResult<()> {
        self.backend(id)?.delete(id.path(), recursive).await?;
        self.events.publish(FsEvent::Deleted(id.clone()));
        Ok(())
    }

    /// Rename without progress or cancellation.
    pub async fn rename(&self, from: &ResourceId, to: &ResourceId, overwrite: bool) -> VfsResult<()> {
        self.rename_with(from, to, overwrite, &TransferOptions::default())
            .await
    }

    /// Rename `from` to `to`.
    ///
    /// Same scheme, authority and parent: one protocol rename. Anything
    /// else: copy, then delete the source. With `overwrite == false` an
    /// existing target fails with `AlreadyExists` before any data moves.
    /// Neither path may contain the other.
    ///
    /// On the copy path an existing target file is replaced by the copy
    /// itself, so a failed or cancelled copy leaves it in place. A target
    /// the copy cannot overwrite (a directory, or a file in the way of a
    /// directory) is removed first.
    #[instrument(skip(self, opts), fields(from = %from, to = %to))]
    pub async fn rename_with(
        &self,
        from: &ResourceId,
        to: &ResourceId,
        overwrite: bool,
        opts: &TransferOptions,
    ) -> VfsResult<()> {
        let src_backend = self.backend(from)?;
        let dst_backend = self.backend(to)?;

        let src_kind = src_backend.stat(from.path()).await?.kind;
        if from == to {
            return Ok(());
        }
        if from.contains(to) {
            return Err(VfsError::invalid_path(format!(
                "cannot move {from} into itself ({to})"
            )));
        }
        if to.contains(from) {
            return Err(VfsError::invalid_path(format!(
                "cannot move {from} onto its ancestor {to}"
            )));
        }

        let dst_kind = match dst_backend.stat(to.path()).await {
            Ok(stat) if !overwrite => {
                return Err(VfsError::already_exists(to.to_string(), stat.kind));
            }
            Ok(stat) => Some(stat.kind),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        if from.same_parent(to) {
            // Protocol renames refuse an existing target.
            if dst_kind.is_some() {
                dst_backend.delete(to.path(), true).await?;
            }
            src_backend.rename(from.path(), to.path()).await?;
        } else {
            let in_the_way = match dst_kind {
                Some(kind) => kind.is_dir() || src_kind.is_dir(),
                None => false,
            };
            if in_the_way {
                dst_backend.delete(to.path(), true).await?;
            }
            debug!("rename across parents, copying then deleting source");
            self.copy_resolved(from, to, overwrite, opts).await?;
            src_backend.delete(from.path(), true).await?;
        }

        self.events.publish(FsEvent::Deleted(from.clone()));
        self.events.publish(FsEvent::Created(to.clone()));
        Ok(())
    }
}
