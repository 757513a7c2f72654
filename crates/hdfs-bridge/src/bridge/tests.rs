use super::*;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::registry::{ClusterDescriptor, ClientRegistry};
use crate::session::Progress;
use crate::vfs::{ByteStream, MemoryBackend};

// ============================================================================
// Mock remote
// ============================================================================

#[derive(Debug, Default)]
struct Calls {
    rename: AtomicUsize,
    delete: AtomicUsize,
    open: AtomicUsize,
    write: AtomicUsize,
    /// Read streams dropped.
    closed: AtomicUsize,
    /// Write bodies dropped.
    bodies_dropped: AtomicUsize,
}

impl Calls {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn reads(&self) -> &AtomicUsize {
        &self.closed
    }

    fn bodies(&self) -> &AtomicUsize {
        &self.bodies_dropped
    }
}

/// Stream that records when it is dropped.
struct Guarded {
    inner: ByteStream,
    calls: Arc<Calls>,
    on_drop: fn(&Calls) -> &AtomicUsize,
}

impl Stream for Guarded {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for Guarded {
    fn drop(&mut self) {
        (self.on_drop)(&self.calls).fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory remote that counts protocol calls.
struct MockRemote {
    inner: MemoryBackend,
    calls: Arc<Calls>,
    /// Yield the first chunk of a read, then hang.
    stall_reads: bool,
    /// Yield the first chunk of a read, then fail.
    fail_reads: bool,
    /// Take one chunk of a write body, then fail.
    fail_writes: bool,
    /// Size reported for every file, whatever its content.
    claimed_size: Option<u64>,
}

impl MockRemote {
    fn new() -> Self {
        Self {
            inner: MemoryBackend::new().with_chunk_size(4),
            calls: Arc::new(Calls::default()),
            stall_reads: false,
            fail_reads: false,
            fail_writes: false,
            claimed_size: None,
        }
    }

    fn stalling() -> Self {
        Self {
            stall_reads: true,
            ..Self::new()
        }
    }

    fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::new()
        }
    }

    fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    fn claiming_size(size: u64) -> Self {
        Self {
            claimed_size: Some(size),
            ..Self::new()
        }
    }
}

#[async_trait]
impl VfsOps for MockRemote {
    async fn stat(&self, path: &str) -> VfsResult<FileStat> {
        let mut stat = self.inner.stat(path).await?;
        if let (Some(size), true) = (self.claimed_size, stat.is_file()) {
            stat.size = size;
        }
        Ok(stat)
    }

    async fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        self.inner.read_dir(path).await
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        self.inner.mkdir(path).await
    }

    async fn delete(&self, path: &str, recursive: bool) -> VfsResult<()> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(path, recursive).await
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        self.calls.rename.fetch_add(1, Ordering::SeqCst);
        self.inner.rename(from, to).await
    }

    async fn open_read(&self, path: &str) -> VfsResult<ByteStream> {
        self.calls.open.fetch_add(1, Ordering::SeqCst);
        let stream = self.inner.open_read(path).await?;
        let inner: ByteStream = if self.stall_reads {
            Box::pin(stream.take(1).chain(futures::stream::pending()))
        } else if self.fail_reads {
            let reset = io::Error::new(io::ErrorKind::ConnectionReset, "datanode reset");
            Box::pin(stream.take(1).chain(futures::stream::iter([Err(reset)])))
        } else {
            stream
        };
        Ok(Box::pin(Guarded {
            inner,
            calls: self.calls.clone(),
            on_drop: Calls::reads,
        }))
    }

    async fn write_from(&self, path: &str, body: ByteStream, overwrite: bool) -> VfsResult<u64> {
        self.calls.write.fetch_add(1, Ordering::SeqCst);
        let mut body: ByteStream = Box::pin(Guarded {
            inner: body,
            calls: self.calls.clone(),
            on_drop: Calls::bodies,
        });
        if self.fail_writes {
            body.next().await;
            return Err(VfsError::protocol("datanode pipeline failed"));
        }
        self.inner.write_from(path, body, overwrite).await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

const AUTH: &str = "u@h:1";

fn remote(path: &str) -> ResourceId {
    ResourceId::remote(AUTH, path)
}

struct Fixture {
    bridge: Bridge,
    mock: Arc<MockRemote>,
    _dir: TempDir,
}

impl Fixture {
    fn with_mock(mock: MockRemote) -> Self {
        let mock = Arc::new(mock);
        let shared = mock.clone();
        let factory = move |_: &ClusterDescriptor| -> VfsResult<Arc<dyn VfsOps>> {
            Ok(shared.clone() as Arc<dyn VfsOps>)
        };
        let registry = ClientRegistry::new(
            Arc::new(vec![ClusterDescriptor::new("u", "h", 1)]),
            Arc::new(factory),
        );
        let dir = TempDir::new().unwrap();
        let bridge = Bridge::new(
            Arc::new(LocalBackend::new(dir.path())),
            Arc::new(registry),
            EventBus::new(64),
        )
        .with_chunk_size(4);
        Self {
            bridge,
            mock,
            _dir: dir,
        }
    }

    fn new() -> Self {
        Self::with_mock(MockRemote::new())
    }

    fn calls(&self) -> &Calls {
        &self.mock.calls
    }
}

// ============================================================================
// Directory operations
// ============================================================================

#[tokio::test]
async fn test_stat_missing_is_not_found() {
    let fx = Fixture::new();
    let err = fx.bridge.stat(&remote("/nope")).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!fx.bridge.exists(&remote("/nope")).await.unwrap());
}

#[tokio::test]
async fn test_unknown_authority_is_configuration_error() {
    let fx = Fixture::new();
    let err = fx
        .bridge
        .stat(&ResourceId::remote("x@y:2", "/a"))
        .await
        .unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_create_directory_recursive_and_idempotent() {
    let fx = Fixture::new();
    let mut events = fx.bridge.subscribe("fs.created");
    let deep = remote("/a/b/c");

    fx.bridge.create_directory(&deep).await.unwrap();
    fx.bridge.create_directory(&deep).await.unwrap();

    assert!(fx.bridge.stat(&remote("/a")).await.unwrap().is_dir());
    assert!(fx.bridge.stat(&deep).await.unwrap().is_dir());
    assert_eq!(
        fx.bridge.read_directory(&remote("/a/b")).await.unwrap(),
        vec![DirEntry::directory("c")]
    );

    assert_eq!(events.try_recv().unwrap().event, FsEvent::Created(deep));
    assert!(events.try_recv().is_none());
}

#[tokio::test]
async fn test_create_directory_over_file() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/a/f", "x");

    let err = fx.bridge.create_directory(&remote("/a/f")).await.unwrap_err();
    assert!(matches!(
        err,
        VfsError::AlreadyExists {
            kind: Some(FileType::File),
            ..
        }
    ));
    assert!(fx.bridge.create_directory(&remote("/a/f/g")).await.is_err());
}

#[tokio::test]
async fn test_create_directory_local() {
    let fx = Fixture::new();
    let id = ResourceId::local("/x/y");
    fx.bridge.create_directory(&id).await.unwrap();
    fx.bridge.create_directory(&id).await.unwrap();
    assert!(fx.bridge.stat(&id).await.unwrap().is_dir());
}

#[tokio::test]
async fn test_delete_requires_recursive_for_non_empty() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/d/f", "x");

    let err = fx.bridge.delete(&remote("/d"), false).await.unwrap_err();
    assert!(matches!(err, VfsError::DirectoryNotEmpty(_)));
    assert!(fx.bridge.exists(&remote("/d/f")).await.unwrap());

    let mut events = fx.bridge.subscribe("fs.deleted");
    fx.bridge.delete(&remote("/d"), true).await.unwrap();
    assert!(!fx.bridge.exists(&remote("/d")).await.unwrap());
    assert_eq!(events.try_recv().unwrap().event, FsEvent::Deleted(remote("/d")));
}

#[tokio::test]
async fn test_rename_same_parent_takes_fast_path() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/a/x", "payload");

    fx.bridge
        .rename(&remote("/a/x"), &remote("/a/y"), false)
        .await
        .unwrap();

    assert_eq!(Calls::get(&fx.calls().rename), 1);
    assert_eq!(Calls::get(&fx.calls().delete), 0);
    assert_eq!(Calls::get(&fx.calls().open), 0);
    assert_eq!(Calls::get(&fx.calls().write), 0);
    assert_eq!(fx.mock.inner.contents("/a/y").unwrap(), "payload");
    assert!(fx.mock.inner.contents("/a/x").is_none());
}

#[tokio::test]
async fn test_rename_across_directories_copies_then_deletes() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/a/x", "payload");

    let mut events = fx.bridge.subscribe("fs.*");
    fx.bridge
        .rename(&remote("/a/x"), &remote("/b/x"), false)
        .await
        .unwrap();

    assert_eq!(Calls::get(&fx.calls().rename), 0);
    assert_eq!(Calls::get(&fx.calls().open), 1);
    assert_eq!(Calls::get(&fx.calls().delete), 1);
    assert_eq!(fx.mock.inner.contents("/b/x").unwrap(), "payload");
    assert!(fx.mock.inner.contents("/a/x").is_none());

    assert_eq!(events.try_recv().unwrap().event, FsEvent::Deleted(remote("/a/x")));
    assert_eq!(events.try_recv().unwrap().event, FsEvent::Created(remote("/b/x")));
}

#[tokio::test]
async fn test_rename_refuses_existing_target_before_moving_data() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/a/x", "new");
    fx.mock.inner.insert_file("/b/x", "old");

    let err = fx
        .bridge
        .rename(&remote("/a/x"), &remote("/b/x"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, VfsError::AlreadyExists { .. }));
    assert_eq!(Calls::get(&fx.calls().open), 0);
    assert_eq!(Calls::get(&fx.calls().write), 0);
    assert_eq!(fx.mock.inner.contents("/b/x").unwrap(), "old");
}

#[tokio::test]
async fn test_rename_overwrite_replaces_target() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/a/x", "new");
    fx.mock.inner.insert_file("/a/y", "old");

    fx.bridge
        .rename(&remote("/a/x"), &remote("/a/y"), true)
        .await
        .unwrap();

    assert_eq!(fx.mock.inner.contents("/a/y").unwrap(), "new");
    assert_eq!(Calls::get(&fx.calls().rename), 1);
}

#[tokio::test]
async fn test_rename_into_itself_is_rejected() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/a/x", "1");

    let err = fx
        .bridge
        .rename(&remote("/a"), &remote("/a/sub"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::InvalidPath(_)));
}

#[tokio::test]
async fn test_rename_onto_ancestor_is_rejected() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/a/b", "precious");

    let err = fx
        .bridge
        .rename(&remote("/a/b"), &remote("/a"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, VfsError::InvalidPath(_)));
    assert_eq!(fx.mock.inner.contents("/a/b").unwrap(), "precious");
    assert_eq!(Calls::get(&fx.calls().delete), 0);
}

#[tokio::test]
async fn test_failed_move_keeps_existing_target() {
    let fx = Fixture::with_mock(MockRemote::failing_reads());
    fx.mock.inner.insert_file("/a/x", "new payload");
    fx.mock.inner.insert_file("/b/x", "old");

    let err = fx
        .bridge
        .rename(&remote("/a/x"), &remote("/b/x"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, VfsError::Protocol(_)));
    assert_eq!(fx.mock.inner.contents("/b/x").unwrap(), "old");
    assert_eq!(fx.mock.inner.contents("/a/x").unwrap(), "new payload");
    assert_eq!(Calls::get(&fx.calls().delete), 0);
    assert_eq!(Calls::get(&fx.calls().closed), 1);
}

#[tokio::test]
async fn test_cancelled_move_keeps_existing_target() {
    let fx = Fixture::with_mock(MockRemote::stalling());
    fx.mock.inner.insert_file("/a/x", vec![1u8; 64]);
    fx.mock.inner.insert_file("/b/x", "old");

    let token = CancellationToken::new();
    let trigger = token.clone();
    let opts = TransferOptions::new()
        .with_cancel(token)
        .with_progress(move |_: Progress| trigger.cancel());

    let err = fx
        .bridge
        .rename_with(&remote("/a/x"), &remote("/b/x"), true, &opts)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(fx.mock.inner.contents("/b/x").unwrap(), "old");
    assert_eq!(fx.mock.inner.contents("/a/x").unwrap().len(), 64);
    assert_eq!(Calls::get(&fx.calls().delete), 0);
    assert_eq!(Calls::get(&fx.calls().open), Calls::get(&fx.calls().closed));
}

#[tokio::test]
async fn test_move_replaces_directory_target() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/a/x", "file");
    fx.mock.inner.insert_file("/b/x/old", "o");

    fx.bridge
        .rename(&remote("/a/x"), &remote("/b/x"), true)
        .await
        .unwrap();

    assert_eq!(fx.mock.inner.contents("/b/x").unwrap(), "file");
    assert!(fx.mock.inner.contents("/b/x/old").is_none());
    assert!(fx.mock.inner.contents("/a/x").is_none());
}

// ============================================================================
// Transfer engine
// ============================================================================

#[tokio::test]
async fn test_read_file_reports_progress() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/f", "0123456789abcdef");

    let reports = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = reports.clone();
    let opts = TransferOptions::new().with_progress(move |p: Progress| sink.lock().push(p));

    let data = fx.bridge.read_file(&remote("/f"), &opts).await.unwrap();
    assert_eq!(data, "0123456789abcdef");

    let reports = reports.lock();
    assert_eq!(reports.len(), 4);
    assert!(reports.iter().all(|p| p.message == "Reading f"));
    let total: f64 = reports.iter().map(|p| p.percent_increment).sum();
    assert!((total - 100.0).abs() < 1e-9);
    assert_eq!(Calls::get(&fx.calls().closed), 1);
}

#[tokio::test]
async fn test_read_directory_as_file_opens_nothing() {
    let fx = Fixture::new();
    fx.bridge.create_directory(&remote("/d")).await.unwrap();

    let err = fx
        .bridge
        .read_file(&remote("/d"), &TransferOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::IsADirectory(_)));
    assert_eq!(Calls::get(&fx.calls().open), 0);
}

#[tokio::test]
async fn test_cancel_read_closes_stream() {
    let fx = Fixture::with_mock(MockRemote::stalling());
    fx.mock.inner.insert_file("/big", vec![7u8; 64]);

    let token = CancellationToken::new();
    let trigger = token.clone();
    let opts = TransferOptions::new()
        .with_cancel(token)
        .with_progress(move |_: Progress| trigger.cancel());

    let err = fx.bridge.read_file(&remote("/big"), &opts).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(Calls::get(&fx.calls().open), 1);
    assert_eq!(Calls::get(&fx.calls().closed), 1);
}

#[tokio::test]
async fn test_cancel_before_start() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/f", "abc");

    let token = CancellationToken::new();
    token.cancel();
    let opts = TransferOptions::new().with_cancel(token);

    let err = fx.bridge.read_file(&remote("/f"), &opts).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(Calls::get(&fx.calls().open), Calls::get(&fx.calls().closed));
}

#[tokio::test]
async fn test_read_tolerates_inflated_size() {
    let fx = Fixture::with_mock(MockRemote::claiming_size(u64::MAX));
    fx.mock.inner.insert_file("/f", "tiny");

    let data = fx
        .bridge
        .read_file(&remote("/f"), &TransferOptions::default())
        .await
        .unwrap();
    assert_eq!(data, "tiny");
}

#[tokio::test]
async fn test_cancel_copy_to_local_closes_source() {
    let fx = Fixture::with_mock(MockRemote::stalling());
    fx.mock.inner.insert_file("/big", vec![7u8; 64]);

    let token = CancellationToken::new();
    let trigger = token.clone();
    let opts = TransferOptions::new()
        .with_cancel(token)
        .with_progress(move |_: Progress| trigger.cancel());

    let err = fx
        .bridge
        .copy(&remote("/big"), &ResourceId::local("/big"), false, &opts)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(Calls::get(&fx.calls().open), 1);
    assert_eq!(Calls::get(&fx.calls().closed), 1);
}

#[tokio::test]
async fn test_write_failure_drops_body() {
    let fx = Fixture::with_mock(MockRemote::failing_writes());

    let err = fx
        .bridge
        .write_file(
            &remote("/f"),
            Bytes::from_static(b"0123456789"),
            WriteOptions::default(),
            &TransferOptions::default(),
        )
        .await
        .unwrap_err();

    match err {
        VfsError::Protocol(msg) => assert!(msg.contains("datanode pipeline failed")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(Calls::get(&fx.calls().bodies_dropped), 1);
    assert!(fx.mock.inner.contents("/f").is_none());
}

#[tokio::test]
async fn test_copy_failure_closes_both_stages() {
    let fx = Fixture::with_mock(MockRemote::failing_writes());
    fx.mock.inner.insert_file("/src", "abcdefgh");

    let err = fx
        .bridge
        .copy(&remote("/src"), &remote("/dst"), false, &TransferOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, VfsError::Protocol(_)));
    assert_eq!(Calls::get(&fx.calls().open), 1);
    assert_eq!(Calls::get(&fx.calls().closed), 1);
    assert_eq!(Calls::get(&fx.calls().bodies_dropped), 1);
    assert!(fx.mock.inner.contents("/dst").is_none());
}

#[tokio::test]
async fn test_write_file_flags() {
    let fx = Fixture::new();
    let id = remote("/new/dir/f.txt");
    let opts = TransferOptions::default();

    let err = fx
        .bridge
        .write_file(&id, Bytes::from("a"), WriteOptions { create: false, overwrite: false }, &opts)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    fx.bridge
        .write_file(&id, Bytes::from("first"), WriteOptions::default(), &opts)
        .await
        .unwrap();
    let err = fx
        .bridge
        .write_file(&id, Bytes::from("second!"), WriteOptions::default(), &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::AlreadyExists { .. }));
    assert_eq!(fx.bridge.stat(&id).await.unwrap().size, 5);

    fx.bridge
        .write_file(&id, Bytes::from("second!"), WriteOptions { create: false, overwrite: true }, &opts)
        .await
        .unwrap();
    assert_eq!(fx.mock.inner.contents("/new/dir/f.txt").unwrap(), "second!");

    let err = fx
        .bridge
        .write_file(&remote("/new"), Bytes::from("x"), WriteOptions { create: true, overwrite: true }, &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::IsADirectory(_)));
}

#[tokio::test]
async fn test_write_file_events() {
    let fx = Fixture::new();
    let mut events = fx.bridge.subscribe("fs.>");
    let id = ResourceId::local("/notes.txt");
    let overwrite = WriteOptions { create: true, overwrite: true };

    fx.bridge
        .write_file(&id, Bytes::from("v1"), overwrite, &TransferOptions::default())
        .await
        .unwrap();
    fx.bridge
        .write_file(&id, Bytes::from("v2"), overwrite, &TransferOptions::default())
        .await
        .unwrap();

    assert_eq!(events.try_recv().unwrap().event, FsEvent::Created(id.clone()));
    assert_eq!(events.try_recv().unwrap().event, FsEvent::Changed(id.clone()));
    assert_eq!(
        fx.bridge.read_file(&id, &TransferOptions::default()).await.unwrap(),
        "v2"
    );
}

#[test]
fn test_copy_plan_classification() {
    use FileType::{Directory, File};

    assert_eq!(CopyPlan::classify(File, None), Some(CopyPlan::FileToFile));
    assert_eq!(CopyPlan::classify(File, Some(File)), Some(CopyPlan::FileToFile));
    assert_eq!(CopyPlan::classify(File, Some(Directory)), Some(CopyPlan::FileIntoDirectory));
    assert_eq!(
        CopyPlan::classify(Directory, Some(Directory)),
        Some(CopyPlan::DirectoryIntoDirectory)
    );
    assert_eq!(CopyPlan::classify(Directory, None), Some(CopyPlan::DirectoryToNew));
    assert_eq!(CopyPlan::classify(Directory, Some(File)), None);
}

#[tokio::test]
async fn test_copy_file_into_directory_appends_name() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/src/a.txt", "hello");
    fx.bridge.create_directory(&remote("/dst")).await.unwrap();

    let target = fx
        .bridge
        .copy(&remote("/src/a.txt"), &remote("/dst"), false, &TransferOptions::default())
        .await
        .unwrap();

    assert_eq!(target, remote("/dst/a.txt"));
    assert_eq!(fx.mock.inner.contents("/dst/a.txt").unwrap(), "hello");
}

#[tokio::test]
async fn test_copy_refuses_existing_file_without_overwrite() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/a", "new");
    fx.mock.inner.insert_file("/b", "old");

    let err = fx
        .bridge
        .copy(&remote("/a"), &remote("/b"), false, &TransferOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::AlreadyExists { .. }));
    assert_eq!(Calls::get(&fx.calls().open), 0);

    fx.bridge
        .copy(&remote("/a"), &remote("/b"), true, &TransferOptions::default())
        .await
        .unwrap();
    assert_eq!(fx.mock.inner.contents("/b").unwrap(), "new");
}

#[tokio::test]
async fn test_copy_directory_between_local_and_remote() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/proj/readme", "r");
    fx.mock.inner.insert_file("/proj/src/lib.rs", "l");
    fx.mock.inner.insert_file("/proj/src/deep/x", "x");

    let local = ResourceId::local("/checkout");
    let target = fx
        .bridge
        .copy(&remote("/proj"), &local, true, &TransferOptions::default())
        .await
        .unwrap();
    assert_eq!(target, local);

    let opts = TransferOptions::default();
    assert_eq!(fx.bridge.read_file(&local.join("readme"), &opts).await.unwrap(), "r");
    assert_eq!(fx.bridge.read_file(&local.join("src/lib.rs"), &opts).await.unwrap(), "l");
    assert_eq!(fx.bridge.read_file(&local.join("src/deep/x"), &opts).await.unwrap(), "x");
    assert_eq!(
        fx.bridge.read_directory(&local).await.unwrap(),
        vec![DirEntry::file("readme"), DirEntry::directory("src")]
    );
}

#[tokio::test]
async fn test_copy_directory_into_itself_is_rejected() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/src/a", "1");

    let err = fx
        .bridge
        .copy(&remote("/src"), &remote("/src"), true, &TransferOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::InvalidPath(_)));
}

#[tokio::test]
async fn test_copy_directory_continues_past_failed_child() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/src/a", "1");
    fx.mock.inner.insert_file("/src/b", "2");
    fx.mock.inner.insert_file("/src/c", "3");
    // A directory where file `b` should land.
    fx.mock.inner.insert_file("/dst/src/b/keep", "k");

    let err = fx
        .bridge
        .copy(&remote("/src"), &remote("/dst"), true, &TransferOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, VfsError::IsADirectory(_)));
    assert_eq!(fx.mock.inner.contents("/dst/src/a").unwrap(), "1");
    assert_eq!(fx.mock.inner.contents("/dst/src/c").unwrap(), "3");
    assert_eq!(fx.mock.inner.contents("/dst/src/b/keep").unwrap(), "k");
    assert_eq!(Calls::get(&fx.calls().write), 2);
}

#[tokio::test]
async fn test_cancel_directory_copy_stops_before_next_child() {
    let fx = Fixture::new();
    fx.mock.inner.insert_file("/src/a", "1");
    fx.mock.inner.insert_file("/src/b", "2");
    fx.mock.inner.insert_file("/src/c", "3");

    let token = CancellationToken::new();
    let trigger = token.clone();
    let opts = TransferOptions::new()
        .with_cancel(token)
        .with_progress(move |_: Progress| trigger.cancel());

    let err = fx
        .bridge
        .copy(&remote("/src"), &remote("/dst"), false, &opts)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(Calls::get(&fx.calls().write), 1);
    assert!(fx.mock.inner.contents("/dst/b").is_none());
    assert!(fx.mock.inner.contents("/dst/c").is_none());
    assert_eq!(Calls::get(&fx.calls().open), Calls::get(&fx.calls().closed));
    assert_eq!(Calls::get(&fx.calls().bodies_dropped), 1);
}
