//! WebHDFS remote store client.
//!
//! A thin typed wrapper around the WebHDFS REST operations. One client is
//! bound per authority (user + host:port + base path + timeout) and holds
//! no per-call state, so it is shared freely behind an `Arc`.
//!
//! ```text
//! stat    GET    ?op=GETFILESTATUS
//! list    GET    ?op=LISTSTATUS
//! mkdir   PUT    ?op=MKDIRS
//! delete  DELETE ?op=DELETE&recursive=
//! rename  PUT    ?op=RENAME&destination=
//! read    GET    ?op=OPEN                  (redirected to a datanode)
//! write   PUT    ?op=CREATE&overwrite=     (307 → PUT body to Location)
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Method, Response, StatusCode, Url, header, redirect};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::debug;

use crate::constants::{DEFAULT_BASE_PATH, DEFAULT_METADATA_TIMEOUT, DEFAULT_STREAM_TIMEOUT};
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{ByteStream, VfsOps};
use crate::vfs::types::{DirEntry, FileStat, FileType};

/// Connection descriptor for one WebHDFS endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebHdfsConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// REST prefix, normally `/webhdfs/v1`.
    pub base_path: String,
    /// Whole-request timeout for metadata calls.
    pub metadata_timeout: Duration,
    /// Connect/read timeout for streaming calls.
    pub stream_timeout: Duration,
}

impl WebHdfsConfig {
    /// Descriptor with default base path and timeouts.
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    /// `user@host:port`, the registry key for this endpoint.
    pub fn authority(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HdfsFileStatus {
    #[serde(default)]
    path_suffix: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    length: u64,
    #[serde(default)]
    modification_time: u64,
}

impl HdfsFileStatus {
    fn file_type(&self) -> FileType {
        if self.kind == "DIRECTORY" {
            FileType::Directory
        } else {
            FileType::File
        }
    }

    fn to_stat(&self) -> FileStat {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_millis(self.modification_time);
        let kind = self.file_type();
        FileStat {
            size: if kind.is_dir() { 0 } else { self.length },
            created: modified,
            modified,
            kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileStatusReply {
    #[serde(rename = "FileStatus")]
    file_status: HdfsFileStatus,
}

#[derive(Debug, Deserialize)]
struct FileStatusesReply {
    #[serde(rename = "FileStatuses")]
    file_statuses: FileStatusList,
}

#[derive(Debug, Deserialize)]
struct FileStatusList {
    #[serde(rename = "FileStatus", default)]
    file_status: Vec<HdfsFileStatus>,
}

#[derive(Debug, Deserialize)]
struct BooleanReply {
    boolean: bool,
}

#[derive(Debug, Deserialize)]
struct RemoteExceptionReply {
    #[serde(rename = "RemoteException")]
    remote_exception: RemoteException,
}

#[derive(Debug, Deserialize)]
struct RemoteException {
    #[serde(default)]
    exception: String,
    #[serde(default)]
    message: String,
}

/// Map a failed WebHDFS reply onto the error taxonomy.
///
/// Unknown exception classes keep the server's message verbatim.
fn map_remote_error(status: StatusCode, body: &str, path: &str) -> VfsError {
    if let Ok(reply) = serde_json::from_str::<RemoteExceptionReply>(body) {
        let ex = reply.remote_exception;
        return match ex.exception.as_str() {
            "FileNotFoundException" => VfsError::not_found(path),
            "FileAlreadyExistsException" => VfsError::AlreadyExists {
                path: path.to_string(),
                kind: None,
            },
            "PathIsNotEmptyDirectoryException" => VfsError::directory_not_empty(path),
            "ParentNotDirectoryException" => VfsError::not_a_directory(path),
            _ => VfsError::protocol(format!("HTTP {}: {}: {}", status, ex.exception, ex.message)),
        };
    }

    if status == StatusCode::NOT_FOUND {
        return VfsError::not_found(path);
    }
    if body.is_empty() {
        VfsError::protocol(format!("HTTP {}", status))
    } else {
        VfsError::protocol(format!("HTTP {}: {}", status, body))
    }
}

// ============================================================================
// Client
// ============================================================================

/// WebHDFS client bound to one authority.
#[derive(Debug, Clone)]
pub struct WebHdfsClient {
    config: WebHdfsConfig,
    /// Metadata calls; whole-request timeout.
    meta_http: reqwest::Client,
    /// Streaming reads; follows datanode redirects.
    stream_http: reqwest::Client,
    /// Two-step CREATE; redirects handled by hand.
    create_http: reqwest::Client,
}

impl WebHdfsClient {
    /// Build a client for the given endpoint.
    pub fn new(config: WebHdfsConfig) -> VfsResult<Self> {
        let meta_http = reqwest::Client::builder()
            .timeout(config.metadata_timeout)
            .build()?;
        let stream_http = reqwest::Client::builder()
            .connect_timeout(config.stream_timeout)
            .read_timeout(config.stream_timeout)
            .build()?;
        let create_http = reqwest::Client::builder()
            .connect_timeout(config.stream_timeout)
            .read_timeout(config.stream_timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            config,
            meta_http,
            stream_http,
            create_http,
        })
    }

    /// The endpoint this client is bound to.
    pub fn config(&self) -> &WebHdfsConfig {
        &self.config
    }

    /// Build the REST URL for `op` on `path`.
    pub fn op_url(&self, path: &str, op: &str, params: &[(&str, &str)]) -> VfsResult<Url> {
        let mut url = Url::parse(&format!("http://{}:{}", self.config.host, self.config.port))
            .map_err(|e| VfsError::invalid_path(format!("{}:{}: {}", self.config.host, self.config.port, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| VfsError::invalid_path(path))?;
            segments.clear();
            segments.extend(self.config.base_path.split('/').filter(|s| !s.is_empty()));
            let mut rest = path.split('/').filter(|s| !s.is_empty()).peekable();
            if rest.peek().is_none() {
                // The filesystem root is `<base>/`, not `<base>`.
                segments.push("");
            }
            segments.extend(rest);
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            query.append_pair("user.name", &self.config.user);
            for (k, v) in params {
                query.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Send a metadata request and check its status.
    async fn call(
        &self,
        method: Method,
        path: &str,
        op: &str,
        params: &[(&str, &str)],
    ) -> VfsResult<Response> {
        let url = self.op_url(path, op, params)?;
        debug!(authority = %self.config.authority(), %method, op, path, "webhdfs request");
        let resp = self.meta_http.request(method, url).send().await?;
        Self::check(resp, path).await
    }

    async fn check(resp: Response, path: &str) -> VfsResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(map_remote_error(status, &body, path))
    }

    async fn call_boolean(
        &self,
        method: Method,
        path: &str,
        op: &str,
        params: &[(&str, &str)],
    ) -> VfsResult<bool> {
        let reply: BooleanReply = self.call(method, path, op, params).await?.json().await?;
        Ok(reply.boolean)
    }
}

#[async_trait]
impl VfsOps for WebHdfsClient {
    async fn stat(&self, path: &str) -> VfsResult<FileStat> {
        let reply: FileStatusReply = self
            .call(Method::GET, path, "GETFILESTATUS", &[])
            .await?
            .json()
            .await?;
        Ok(reply.file_status.to_stat())
    }

    async fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let reply: FileStatusesReply = self
            .call(Method::GET, path, "LISTSTATUS", &[])
            .await?
            .json()
            .await?;
        let statuses = reply.file_statuses.file_status;

        // LISTSTATUS on a file answers with the file itself
        if let [only] = statuses.as_slice() {
            if only.path_suffix.is_empty() && only.file_type().is_file() {
                return Err(VfsError::not_a_directory(path));
            }
        }

        let mut entries: Vec<DirEntry> = statuses
            .iter()
            .filter(|s| !s.path_suffix.is_empty())
            .map(|s| DirEntry::new(s.path_suffix.clone(), s.file_type()))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        if self.call_boolean(Method::PUT, path, "MKDIRS", &[]).await? {
            Ok(())
        } else {
            Err(VfsError::protocol(format!("MKDIRS refused for {}", path)))
        }
    }

    async fn delete(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let recursive = if recursive { "true" } else { "false" };
        let deleted = self
            .call_boolean(Method::DELETE, path, "DELETE", &[("recursive", recursive)])
            .await
            .map_err(|e| match e {
                // Older namenodes report this as a plain IOException
                VfsError::Protocol(msg) if msg.contains("non empty") || msg.contains("not empty") => {
                    VfsError::directory_not_empty(path)
                }
                other => other,
            })?;
        if deleted {
            Ok(())
        } else {
            Err(VfsError::not_found(path))
        }
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        if self
            .call_boolean(Method::PUT, from, "RENAME", &[("destination", to)])
            .await?
        {
            Ok(())
        } else {
            Err(VfsError::protocol(format!("RENAME {} -> {} refused", from, to)))
        }
    }

    async fn open_read(&self, path: &str) -> VfsResult<ByteStream> {
        let url = self.op_url(path, "OPEN", &[])?;
        debug!(authority = %self.config.authority(), path, "webhdfs open");
        let resp = self.stream_http.get(url).send().await?;
        let resp = Self::check(resp, path).await?;
        Ok(Box::pin(
            resp.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other)),
        ))
    }

    async fn write_from(&self, path: &str, body: ByteStream, overwrite: bool) -> VfsResult<u64> {
        let overwrite = if overwrite { "true" } else { "false" };
        let url = self.op_url(path, "CREATE", &[("overwrite", overwrite)])?;
        debug!(authority = %self.config.authority(), path, "webhdfs create");

        let resp = self.create_http.put(url).send().await?;
        let status = resp.status();
        if !status.is_redirection() {
            let resp = Self::check(resp, path).await?;
            return Err(VfsError::protocol(format!(
                "CREATE for {} answered {} without a datanode redirect",
                path,
                resp.status()
            )));
        }
        let location = resp
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| VfsError::protocol(format!("CREATE redirect for {} has no Location", path)))?;
        let location = Url::parse(location).map_err(|e| VfsError::protocol(e.to_string()))?;

        let written = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&written);
        let counted = body.inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                counter.fetch_add(bytes.len() as u64, Ordering::Relaxed);
            }
        });

        let resp = self
            .create_http
            .put(location)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(counted))
            .send()
            .await?;
        Self::check(resp, path).await?;

        Ok(written.load(Ordering::Relaxed))
    }
}
