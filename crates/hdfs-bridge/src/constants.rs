//! Bridge configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default REST prefix of a WebHDFS endpoint.
pub const DEFAULT_BASE_PATH: &str = "/webhdfs/v1";

/// Timeout for metadata calls (stat, list, mkdir, delete, rename).
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect/read timeout for streaming calls.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Listing page size for collaborators that paginate.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Read chunk size for local and in-memory streams.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound on the buffer reserved up front for a whole-file read.
/// Reported sizes can be stale; the buffer grows past this as needed.
pub const READ_PREALLOC_LIMIT: u64 = 16 * DEFAULT_CHUNK_SIZE as u64;

/// Capacity of the change-notification channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Config file name under the user config directory.
pub const CONFIG_DIR_NAME: &str = "hdfs-bridge";
pub const CONFIG_FILE_NAME: &str = "config.ron";
