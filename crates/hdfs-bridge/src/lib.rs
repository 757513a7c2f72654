//! # hdfs-bridge
//!
//! A uniform filesystem interface over local disk and WebHDFS clusters.
//!
//! Everything is addressed by a [`ResourceId`] (`local:///path` or
//! `remote://user@host:port/path`). The [`Bridge`]:
//! - Resolves ids to a backend, building one remote client per authority
//! - Creates directories recursively and renames with a copy fallback
//! - Streams reads, writes and copies with progress and cancellation
//! - Publishes created/changed/deleted events after each mutation

pub mod batch;
pub mod bridge;
pub mod config;
pub mod constants;
pub mod events;
pub mod registry;
pub mod session;
pub mod uri;
pub mod vfs;

pub use batch::{NoStatus, StatusIndicator, download, upload};
pub use bridge::{Bridge, CopyPlan, WriteOptions};
pub use config::{BridgeConfig, ConfigError, config_file_path};
pub use events::{EventBus, EventMessage, FsEvent, Subscription, WatchHandle, matches_pattern};
pub use registry::{ClientFactory, ClientRegistry, ClusterDescriptor, ClusterSource, WebHdfsFactory};
pub use session::{Progress, ProgressSink, TransferOptions, TransferSession};
pub use uri::{Authority, ResourceId, Scheme};
pub use vfs::{
    ByteStream, DirEntry, FileStat, FileType, LocalBackend, MemoryBackend, VfsError, VfsOps,
    VfsResult, WebHdfsClient, WebHdfsConfig,
};
