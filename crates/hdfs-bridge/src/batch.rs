//! Batch upload and download.
//!
//! A batch is a list of inputs and one destination directory. Inputs are
//! copied one after another, each under its own base name. The first
//! failure stops the batch; nothing is resumed or retried.

use tracing::{info, instrument};

use crate::bridge::Bridge;
use crate::session::TransferOptions;
use crate::uri::ResourceId;
use crate::vfs::{VfsError, VfsResult};

/// Receives batch-level status: which input is in flight.
pub trait StatusIndicator: Send + Sync {
    /// Called before input `index` (zero-based) of `total` starts.
    fn update(&self, index: usize, total: usize, name: &str);

    /// Called once the batch stops, successfully or not.
    fn finish(&self) {}
}

impl<F> StatusIndicator for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn update(&self, index: usize, total: usize, name: &str) {
        self(index, total, name)
    }
}

/// Ignores status updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStatus;

impl StatusIndicator for NoStatus {
    fn update(&self, _index: usize, _total: usize, _name: &str) {}
}

/// Copy local files and folders into a remote directory.
pub async fn upload(
    bridge: &Bridge,
    sources: &[ResourceId],
    destination: &ResourceId,
    overwrite: bool,
    status: &dyn StatusIndicator,
    opts: &TransferOptions,
) -> VfsResult<Vec<ResourceId>> {
    if let Some(bad) = sources.iter().find(|s| !s.is_local()) {
        return Err(VfsError::invalid_path(format!("upload source must be local: {bad}")));
    }
    if destination.is_local() {
        return Err(VfsError::invalid_path(format!(
            "upload destination must be remote: {destination}"
        )));
    }
    run_batch(bridge, sources, destination, overwrite, status, opts).await
}

/// Copy remote files and folders into a local directory.
pub async fn download(
    bridge: &Bridge,
    sources: &[ResourceId],
    destination: &ResourceId,
    overwrite: bool,
    status: &dyn StatusIndicator,
    opts: &TransferOptions,
) -> VfsResult<Vec<ResourceId>> {
    if let Some(bad) = sources.iter().find(|s| s.is_local()) {
        return Err(VfsError::invalid_path(format!("download source must be remote: {bad}")));
    }
    if !destination.is_local() {
        return Err(VfsError::invalid_path(format!(
            "download destination must be local: {destination}"
        )));
    }
    run_batch(bridge, sources, destination, overwrite, status, opts).await
}

#[instrument(skip_all, fields(destination = %destination, total = sources.len()))]
async fn run_batch(
    bridge: &Bridge,
    sources: &[ResourceId],
    destination: &ResourceId,
    overwrite: bool,
    status: &dyn StatusIndicator,
    opts: &TransferOptions,
) -> VfsResult<Vec<ResourceId>> {
    let result = copy_each(bridge, sources, destination, overwrite, status, opts).await;
    status.finish();
    if let Ok(targets) = &result {
        info!(count = targets.len(), "batch complete");
    }
    result
}

async fn copy_each(
    bridge: &Bridge,
    sources: &[ResourceId],
    destination: &ResourceId,
    overwrite: bool,
    status: &dyn StatusIndicator,
    opts: &TransferOptions,
) -> VfsResult<Vec<ResourceId>> {
    bridge.create_directory(destination).await?;

    let total = sources.len();
    let mut targets = Vec::with_capacity(total);
    for (index, source) in sources.iter().enumerate() {
        if opts.is_cancelled() {
            return Err(VfsError::Cancelled);
        }
        let name = source.base_name();
        status.update(index, total, name);

        // `destination` is a directory, so the copy lands at `destination/name`.
        let target = bridge.copy(source, destination, overwrite, opts).await?;
        targets.push(target);
    }
    Ok(targets)
}
