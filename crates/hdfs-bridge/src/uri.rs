//! Resource addressing.
//!
//! Every operation names its target with a [`ResourceId`]: a scheme
//! (`local` or `remote`), an authority and an absolute slash-separated
//! path. The string form is `<scheme>://<authority><path>`, e.g.
//! `remote://amy@namenode:9870/data/a.csv` or `local:///tmp/a.csv`.
//!
//! Paths are normalized on construction: a leading `/`, no trailing `/`
//! (except the root), no empty segments. Nothing is resolved relative to
//! a working directory.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};

use crate::vfs::{VfsError, VfsResult};

/// Which side of the bridge a resource lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    /// The local disk.
    Local,
    /// A WebHDFS cluster, addressed by authority.
    Remote,
}

/// `user@host:port`, parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Authority {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl Authority {
    /// `host:port`, the prefix matched against cluster base paths.
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for Authority {
    type Err = VfsError;

    fn from_str(s: &str) -> VfsResult<Self> {
        let bad = || VfsError::invalid_path(format!("malformed authority: {s:?}"));
        let (user, host_port) = s.split_once('@').ok_or_else(bad)?;
        let (host, port) = host_port.rsplit_once(':').ok_or_else(bad)?;
        if user.is_empty() || host.is_empty() {
            return Err(bad());
        }
        let port = port.parse().map_err(|_| bad())?;
        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Scheme + authority + path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    scheme: Scheme,
    authority: String,
    path: String,
}

/// Normalize a path: leading `/`, no empty segments, no trailing `/`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

impl ResourceId {
    /// Create an identifier, normalizing the path.
    pub fn new(scheme: Scheme, authority: impl Into<String>, path: &str) -> Self {
        Self {
            scheme,
            authority: authority.into(),
            path: normalize_path(path),
        }
    }

    /// A local-disk identifier.
    pub fn local(path: &str) -> Self {
        Self::new(Scheme::Local, "", path)
    }

    /// A remote identifier under `authority` (`user@host:port`).
    pub fn remote(authority: impl Into<String>, path: &str) -> Self {
        Self::new(Scheme::Remote, authority, path)
    }

    /// Parse `<scheme>://<authority><path>`.
    pub fn parse(s: &str) -> VfsResult<Self> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| VfsError::invalid_path(format!("missing scheme: {s:?}")))?;
        let scheme = Scheme::from_str(scheme)
            .map_err(|_| VfsError::invalid_path(format!("unknown scheme {scheme:?} in {s:?}")))?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        if scheme == Scheme::Remote {
            authority.parse::<Authority>()?;
        }
        Ok(Self::new(scheme, authority, path))
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_local(&self) -> bool {
        self.scheme == Scheme::Local
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Last path segment; empty at the root.
    pub fn base_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    /// Append a segment with exactly one separator.
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        let mut joined = self.clone();
        if segment.is_empty() {
            return joined;
        }
        if !joined.is_root() {
            joined.path.push('/');
        }
        joined.path.push_str(segment);
        joined.path = normalize_path(&joined.path);
        joined
    }

    /// Remove the last segment, returning it. `None` at the root.
    pub fn pop(&mut self) -> Option<String> {
        if self.is_root() {
            return None;
        }
        let idx = self.path.rfind('/')?;
        let name = self.path[idx + 1..].to_string();
        self.path.truncate(idx.max(1));
        Some(name)
    }

    /// The parent directory. `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let mut parent = self.clone();
        parent.pop().map(|_| parent)
    }

    /// Same scheme and authority.
    pub fn same_authority(&self, other: &Self) -> bool {
        self.scheme == other.scheme && self.authority == other.authority
    }

    /// Same scheme, authority and parent directory.
    pub fn same_parent(&self, other: &Self) -> bool {
        self.same_authority(other) && self.parent() == other.parent()
    }

    /// True if `other` is this resource or lies beneath it.
    pub fn contains(&self, other: &Self) -> bool {
        self.same_authority(other)
            && (self.is_root()
                || other.path == self.path
                || other.path.starts_with(&format!("{}/", self.path)))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.path)
    }
}

impl FromStr for ResourceId {
    type Err = VfsError;

    fn from_str(s: &str) -> VfsResult<Self> {
        Self::parse(s)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
