//! Client registry: one remote client per authority.
//!
//! Cluster descriptors are owned elsewhere and read through
//! [`ClusterSource`]. The registry matches an authority
//! (`user@host:port`) against them, builds a client through its
//! [`ClientFactory`] on first use, and caches it for the life of the
//! registry.
//!
//! Construction is single-flight: the map shard for the authority stays
//! locked while the client is built, so concurrent first callers observe
//! the same instance. Factories are synchronous for that reason.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::{DEFAULT_BASE_PATH, DEFAULT_METADATA_TIMEOUT, DEFAULT_STREAM_TIMEOUT};
use crate::uri::Authority;
use crate::vfs::{VfsError, VfsOps, VfsResult, WebHdfsClient, WebHdfsConfig};

// ============================================================================
// Cluster descriptors
// ============================================================================

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

/// Connection parameters for one cluster. Read-only to the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    /// Display name.
    #[serde(default)]
    pub name: String,
    pub username: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Streaming timeout override.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ClusterDescriptor {
    pub fn new(username: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            name: host.clone(),
            username: username.into(),
            host,
            port,
            base_path: default_base_path(),
            timeout_ms: None,
        }
    }

    /// `user@host:port`.
    pub fn authority(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// `host:port` followed by the REST prefix.
    pub fn remote_root(&self) -> String {
        let base = if self.base_path.starts_with('/') {
            self.base_path.clone()
        } else {
            format!("/{}", self.base_path)
        };
        format!("{}:{}{}", self.host, self.port, base)
    }

    /// True if this descriptor backs `authority`.
    pub fn matches(&self, authority: &Authority) -> bool {
        self.username == authority.user
            && self
                .remote_root()
                .starts_with(&format!("{}/", authority.host_port()))
    }

    /// WebHDFS endpoint for this cluster.
    pub fn webhdfs_config(&self, metadata_timeout: Duration, stream_timeout: Duration) -> WebHdfsConfig {
        let mut config = WebHdfsConfig::new(&self.host, self.port, &self.username);
        config.base_path = self.base_path.clone();
        config.metadata_timeout = metadata_timeout;
        config.stream_timeout = self
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(stream_timeout);
        config
    }
}

/// Read-only access to the known clusters, in priority order.
pub trait ClusterSource: Send + Sync {
    fn list_clusters(&self) -> Vec<ClusterDescriptor>;
}

impl ClusterSource for Vec<ClusterDescriptor> {
    fn list_clusters(&self) -> Vec<ClusterDescriptor> {
        self.clone()
    }
}

// ============================================================================
// Client factories
// ============================================================================

/// Builds the client for a matched cluster.
pub trait ClientFactory: Send + Sync {
    fn create(&self, cluster: &ClusterDescriptor) -> VfsResult<Arc<dyn VfsOps>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&ClusterDescriptor) -> VfsResult<Arc<dyn VfsOps>> + Send + Sync,
{
    fn create(&self, cluster: &ClusterDescriptor) -> VfsResult<Arc<dyn VfsOps>> {
        self(cluster)
    }
}

/// Builds [`WebHdfsClient`]s.
#[derive(Debug, Clone)]
pub struct WebHdfsFactory {
    pub metadata_timeout: Duration,
    pub stream_timeout: Duration,
}

impl Default for WebHdfsFactory {
    fn default() -> Self {
        Self {
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }
}

impl ClientFactory for WebHdfsFactory {
    fn create(&self, cluster: &ClusterDescriptor) -> VfsResult<Arc<dyn VfsOps>> {
        let config = cluster.webhdfs_config(self.metadata_timeout, self.stream_timeout);
        Ok(Arc::new(WebHdfsClient::new(config)?))
    }
}

// ============================================================================
// ClientRegistry
// ============================================================================

/// Authority → remote client cache.
pub struct ClientRegistry {
    clusters: Arc<dyn ClusterSource>,
    factory: Arc<dyn ClientFactory>,
    clients: DashMap<String, Arc<dyn VfsOps>>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("authorities", &self.authorities())
            .finish()
    }
}

impl ClientRegistry {
    pub fn new(clusters: Arc<dyn ClusterSource>, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            clusters,
            factory,
            clients: DashMap::new(),
        }
    }

    /// Registry building WebHDFS clients with default timeouts.
    pub fn webhdfs(clusters: Arc<dyn ClusterSource>) -> Self {
        Self::new(clusters, Arc::new(WebHdfsFactory::default()))
    }

    /// The first descriptor backing `authority`.
    pub fn find_cluster(&self, authority: &Authority) -> Option<ClusterDescriptor> {
        self.clusters
            .list_clusters()
            .into_iter()
            .find(|c| c.matches(authority))
    }

    /// Return the client for `authority`, building it if needed.
    ///
    /// A second call for a registered authority returns the cached client
    /// and never replaces it.
    pub fn ensure_client(&self, authority: &str) -> VfsResult<Arc<dyn VfsOps>> {
        if let Some(client) = self.clients.get(authority) {
            return Ok(Arc::clone(client.value()));
        }

        let parsed: Authority = authority
            .parse()
            .map_err(|_| VfsError::MissingConfiguration(authority.to_string()))?;

        match self.clients.entry(authority.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let cluster = self
                    .find_cluster(&parsed)
                    .ok_or_else(|| VfsError::MissingConfiguration(authority.to_string()))?;
                let client = self.factory.create(&cluster)?;
                info!(authority, cluster = %cluster.name, "registered remote client");
                entry.insert(Arc::clone(&client));
                Ok(client)
            }
        }
    }

    /// Like [`ensure_client`](Self::ensure_client), but any failure is `Unavailable`.
    pub fn get_client(&self, authority: &str) -> VfsResult<Arc<dyn VfsOps>> {
        self.ensure_client(authority)
            .map_err(|e| VfsError::Unavailable(format!("{authority}: {e}")))
    }

    /// Drop the cached client. Returns true if one was cached.
    pub fn evict(&self, authority: &str) -> bool {
        let removed = self.clients.remove(authority).is_some();
        if removed {
            debug!(authority, "evicted remote client");
        }
        removed
    }

    /// Registered authorities, sorted.
    pub fn authorities(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.clients.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn clusters(&self) -> Vec<ClusterDescriptor> {
        self.clusters.list_clusters()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
