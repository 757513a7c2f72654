//! Bridge configuration.
//!
//! Loaded from RON, by default `~/.config/hdfs-bridge/config.ron`:
//!
//! ```ron
//! (
//!     clusters: [
//!         (name: "prod", username: "amy", host: "namenode", port: 9870),
//!         (name: "lab", username: "etl", host: "10.0.0.7", port: 50070,
//!          base_path: "/webhdfs/v1", timeout_ms: Some(120000)),
//!     ],
//!     stream_timeout_ms: 60000,
//! )
//! ```
//!
//! Every field has a default; a missing file means "no clusters".

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_CHUNK_SIZE, DEFAULT_EVENT_CAPACITY,
    DEFAULT_METADATA_TIMEOUT, DEFAULT_PAGE_SIZE, DEFAULT_STREAM_TIMEOUT,
};
use crate::registry::{ClusterDescriptor, ClusterSource, WebHdfsFactory};

/// Error type for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Top-level bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub clusters: Vec<ClusterDescriptor>,
    /// Root of the `local://` namespace.
    pub local_root: PathBuf,
    pub metadata_timeout_ms: u64,
    pub stream_timeout_ms: u64,
    pub page_size: usize,
    pub chunk_size: usize,
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            local_root: PathBuf::from("/"),
            metadata_timeout_ms: DEFAULT_METADATA_TIMEOUT.as_millis() as u64,
            stream_timeout_ms: DEFAULT_STREAM_TIMEOUT.as_millis() as u64,
            page_size: DEFAULT_PAGE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Default config file path (`~/.config/hdfs-bridge/config.ron`).
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl BridgeConfig {
    /// Parse RON text.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Config file not found at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = Self::from_ron(&text)?;
        debug!(path = %path.display(), clusters = config.clusters.len(), "loaded config");
        Ok(config)
    }

    /// Load from the user config directory, if there is one.
    pub fn load_default() -> Result<Self, ConfigError> {
        match config_file_path() {
            Some(path) => Self::load(&path),
            None => {
                info!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }

    /// WebHDFS factory honouring the configured timeouts.
    pub fn client_factory(&self) -> WebHdfsFactory {
        WebHdfsFactory {
            metadata_timeout: self.metadata_timeout(),
            stream_timeout: self.stream_timeout(),
        }
    }
}

impl ClusterSource for BridgeConfig {
    fn list_clusters(&self) -> Vec<ClusterDescriptor> {
        self.clusters.clone()
    }
}
