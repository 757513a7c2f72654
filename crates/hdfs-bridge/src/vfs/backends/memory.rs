//! In-memory filesystem backend.
//!
//! Used for testing and as a scratch remote. All data is ephemeral.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::constants::DEFAULT_CHUNK_SIZE;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{ByteStream, VfsOps};
use crate::vfs::types::{DirEntry, FileStat, FileType};

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Bytes, stat: FileStat },
    Directory { stat: FileStat },
}

impl Entry {
    fn stat(&self) -> &FileStat {
        match self {
            Entry::File { stat, .. } => stat,
            Entry::Directory { stat } => stat,
        }
    }

    fn kind(&self) -> FileType {
        self.stat().kind
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via internal `RwLock`. Keys are normalized absolute paths;
/// `/` always exists.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, Entry>>,
    chunk_size: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "/".to_string(),
            Entry::Directory {
                stat: FileStat::directory(),
            },
        );
        Self {
            entries: RwLock::new(entries),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the chunk size used for read streams.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Normalize a path: leading `/`, no empty or `.` segments, `..` pops.
    fn normalize(path: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for seg in path.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                s => parts.push(s),
            }
        }
        format!("/{}", parts.join("/"))
    }

    fn parent_of(path: &str) -> Option<&str> {
        if path == "/" {
            return None;
        }
        match path.rfind('/') {
            Some(0) => Some("/"),
            Some(idx) => Some(&path[..idx]),
            None => None,
        }
    }

    fn name_of(path: &str) -> &str {
        path.rsplit('/').next().unwrap_or(path)
    }

    fn require_parent_dir(entries: &BTreeMap<String, Entry>, path: &str) -> VfsResult<()> {
        let parent = Self::parent_of(path).ok_or_else(|| VfsError::invalid_path(path))?;
        match entries.get(parent) {
            Some(Entry::Directory { .. }) => Ok(()),
            Some(Entry::File { .. }) => Err(VfsError::not_a_directory(parent)),
            None => Err(VfsError::not_found(parent)),
        }
    }

    fn children<'a>(
        entries: &'a BTreeMap<String, Entry>,
        dir: &str,
    ) -> impl Iterator<Item = (&'a String, &'a Entry)> + use<'a> {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{}/", dir)
        };
        entries
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(&prefix))
    }

    /// Insert a file directly, creating missing parents. Test fixture helper.
    pub fn insert_file(&self, path: &str, data: impl Into<Bytes>) {
        let path = Self::normalize(path);
        let data: Bytes = data.into();
        let mut entries = self.entries.write();

        let mut current = String::new();
        if let Some(parent) = Self::parent_of(&path) {
            for seg in parent.split('/').filter(|s| !s.is_empty()) {
                current.push('/');
                current.push_str(seg);
                entries.entry(current.clone()).or_insert(Entry::Directory {
                    stat: FileStat::directory(),
                });
            }
        }
        entries.insert(
            path,
            Entry::File {
                stat: FileStat::file(data.len() as u64),
                data,
            },
        );
    }

    /// Snapshot a file's contents. Test fixture helper.
    pub fn contents(&self, path: &str) -> Option<Bytes> {
        match self.entries.read().get(&Self::normalize(path)) {
            Some(Entry::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl VfsOps for MemoryBackend {
    async fn stat(&self, path: &str) -> VfsResult<FileStat> {
        let normalized = Self::normalize(path);
        self.entries
            .read()
            .get(&normalized)
            .map(|e| e.stat().clone())
            .ok_or_else(|| VfsError::not_found(normalized))
    }

    async fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(normalized)),
            None => return Err(VfsError::not_found(normalized)),
        }

        let result = Self::children(&entries, &normalized)
            .filter(|(k, _)| Self::parent_of(k) == Some(normalized.as_str()))
            .map(|(k, e)| DirEntry::new(Self::name_of(k), e.kind()))
            .collect();
        Ok(result)
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(&normalized) {
            return Err(VfsError::already_exists(normalized, existing.kind()));
        }
        Self::require_parent_dir(&entries, &normalized)?;

        entries.insert(
            normalized,
            Entry::Directory {
                stat: FileStat::directory(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let normalized = Self::normalize(path);
        if normalized == "/" {
            return Err(VfsError::invalid_path("refusing to delete the backend root"));
        }
        let mut entries = self.entries.write();

        match entries.get(&normalized) {
            None => return Err(VfsError::not_found(normalized)),
            Some(Entry::File { .. }) => {}
            Some(Entry::Directory { .. }) => {
                let descendants: Vec<String> = Self::children(&entries, &normalized)
                    .map(|(k, _)| k.clone())
                    .collect();
                if !descendants.is_empty() && !recursive {
                    return Err(VfsError::directory_not_empty(normalized));
                }
                for key in descendants {
                    entries.remove(&key);
                }
            }
        }
        entries.remove(&normalized);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let from = Self::normalize(from);
        let to = Self::normalize(to);
        let mut entries = self.entries.write();

        if !entries.contains_key(&from) {
            return Err(VfsError::not_found(from));
        }
        if let Some(existing) = entries.get(&to) {
            return Err(VfsError::already_exists(to, existing.kind()));
        }
        Self::require_parent_dir(&entries, &to)?;

        let moved: Vec<String> = Self::children(&entries, &from)
            .map(|(k, _)| k.clone())
            .collect();
        for key in moved {
            if let Some(entry) = entries.remove(&key) {
                let suffix = &key[from.len()..];
                entries.insert(format!("{}{}", to, suffix), entry);
            }
        }
        if let Some(entry) = entries.remove(&from) {
            entries.insert(to, entry);
        }
        Ok(())
    }

    async fn open_read(&self, path: &str) -> VfsResult<ByteStream> {
        let normalized = Self::normalize(path);
        let data = match self.entries.read().get(&normalized) {
            Some(Entry::File { data, .. }) => data.clone(),
            Some(Entry::Directory { .. }) => return Err(VfsError::is_a_directory(normalized)),
            None => return Err(VfsError::not_found(normalized)),
        };

        let chunk_size = self.chunk_size;
        let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
            .step_by(chunk_size)
            .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn write_from(
        &self,
        path: &str,
        mut body: ByteStream,
        overwrite: bool,
    ) -> VfsResult<u64> {
        let normalized = Self::normalize(path);
        {
            let entries = self.entries.read();
            match entries.get(&normalized) {
                Some(Entry::Directory { .. }) => {
                    return Err(VfsError::is_a_directory(normalized));
                }
                Some(Entry::File { .. }) if !overwrite => {
                    return Err(VfsError::already_exists(normalized, FileType::File));
                }
                _ => {}
            }
            Self::require_parent_dir(&entries, &normalized)?;
        }

        // Buffer first so a failed body leaves no partial file behind
        let mut buf = Vec::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let written = buf.len() as u64;

        let mut stat = FileStat::file(written);
        let mut entries = self.entries.write();
        if let Some(Entry::File { stat: old, .. }) = entries.get(&normalized) {
            stat.created = old.created;
        }
        stat.modified = SystemTime::now();
        entries.insert(
            normalized,
            Entry::File {
                data: Bytes::from(buf),
                stat,
            },
        );
        Ok(written)
    }
}
