//! Transfer sessions: progress, cancellation and stream-stage teardown.
//!
//! Every streaming call (read, write, copy of one file) creates one
//! [`TransferSession`]. The session owns the byte counter, the expected
//! total, a cancellation token and a count of open stream stages. Stream
//! stages attach to the session through [`TransferSession::track`], a
//! pass-through that counts bytes, reports progress and stops yielding
//! data once the session is cancelled.
//!
//! [`TransferSession::run`] drives the transfer future. If cancellation
//! wins, the future is dropped before the error is returned, which drops
//! every stream it owns (file handles, HTTP bodies). Callers therefore
//! never see a rejection while a stage is still open.

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::vfs::{ByteStream, VfsError, VfsResult};

/// One progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub message: String,
    /// Percentage points gained since the previous report.
    pub percent_increment: f64,
}

/// Receives progress reports.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn report(&self, progress: Progress) {
        self(progress)
    }
}

/// Optional cancellation signal and progress callback for a call.
#[derive(Clone, Default)]
pub struct TransferOptions {
    pub cancel: Option<CancellationToken>,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl fmt::Debug for TransferOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferOptions")
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl TransferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Arc::new(sink));
        self
    }

    /// True if the caller's token has already fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }
}

struct SessionState {
    label: String,
    total: u64,
    transferred: AtomicU64,
    /// Last percentage reported, so increments stay monotonic.
    reported: Mutex<f64>,
    cancel: CancellationToken,
    cancel_requested: AtomicBool,
    open_stages: AtomicUsize,
    progress: Option<Arc<dyn ProgressSink>>,
}

/// Per-call transfer state. Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct TransferSession {
    state: Arc<SessionState>,
}

impl fmt::Debug for TransferSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSession")
            .field("label", &self.state.label)
            .field("total", &self.state.total)
            .field("transferred", &self.transferred())
            .field("cancelled", &self.is_cancelled())
            .field("open_stages", &self.open_stages())
            .finish()
    }
}

impl TransferSession {
    /// Start a session expecting `total` bytes.
    ///
    /// The session listens on a child of the caller's token: cancelling
    /// the session never cancels the caller.
    pub fn new(label: impl Into<String>, total: u64, options: &TransferOptions) -> Self {
        let cancel = options
            .cancel
            .as_ref()
            .map(|t| t.child_token())
            .unwrap_or_default();
        Self {
            state: Arc::new(SessionState {
                label: label.into(),
                total,
                transferred: AtomicU64::new(0),
                reported: Mutex::new(0.0),
                cancel,
                cancel_requested: AtomicBool::new(false),
                open_stages: AtomicUsize::new(0),
                progress: options.progress.clone(),
            }),
        }
    }

    pub fn transferred(&self) -> u64 {
        self.state.transferred.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancel.is_cancelled()
    }

    /// Number of tracked stream stages not yet dropped.
    pub fn open_stages(&self) -> usize {
        self.state.open_stages.load(Ordering::Acquire)
    }

    /// Cancel the session. Returns false if it was already cancelled.
    ///
    /// Tracked stages stop yielding data, including any a backend handed
    /// off to another task (an HTTP request body held by a connection).
    pub fn cancel(&self) -> bool {
        if self.state.cancel_requested.swap(true, Ordering::AcqRel) || self.is_cancelled() {
            return false;
        }
        debug!(label = %self.state.label, "transfer cancelled");
        self.state.cancel.cancel();
        true
    }

    /// Attach a stream stage: counts bytes, reports progress, and turns
    /// into an `Interrupted` error once the session is cancelled.
    pub fn track(&self, inner: ByteStream) -> ByteStream {
        self.state.open_stages.fetch_add(1, Ordering::AcqRel);
        Box::pin(TrackedStream {
            inner,
            session: self.clone(),
            done: false,
        })
    }

    fn record(&self, n: usize) {
        let transferred = self
            .state
            .transferred
            .fetch_add(n as u64, Ordering::AcqRel)
            + n as u64;

        let Some(sink) = &self.state.progress else {
            return;
        };
        if self.state.total == 0 {
            return;
        }
        let percent = (transferred as f64 / self.state.total as f64 * 100.0).min(100.0);
        let increment = {
            let mut reported = self.state.reported.lock();
            let increment = percent - *reported;
            if increment <= 0.0 {
                return;
            }
            *reported = percent;
            increment
        };
        sink.report(Progress {
            message: self.state.label.clone(),
            percent_increment: increment,
        });
    }

    /// Drive a transfer future to completion or cancellation.
    ///
    /// On cancellation the future, and every stage it owns, is dropped
    /// before `Cancelled` is returned. On any other failure the session is
    /// cancelled too, so no stage keeps yielding after the error is
    /// delivered. Stream I/O failures surface as `Protocol` with the
    /// underlying message intact.
    pub async fn run<T, F>(&self, transfer: F) -> VfsResult<T>
    where
        F: Future<Output = VfsResult<T>>,
    {
        let outcome = tokio::select! {
            biased;
            _ = self.state.cancel.cancelled() => Err(VfsError::Cancelled),
            result = transfer => result,
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let already_cancelled = self.is_cancelled();
        self.cancel();

        match err {
            _ if already_cancelled => Err(VfsError::Cancelled),
            VfsError::Io(e) => Err(VfsError::protocol(e.to_string())),
            e => Err(e),
        }
    }
}

/// Pass-through stage owned by a session.
struct TrackedStream {
    inner: ByteStream,
    session: TransferSession,
    done: bool,
}

impl Stream for TrackedStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.session.is_cancelled() {
            this.done = true;
            return Poll::Ready(Some(Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "transfer cancelled",
            ))));
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.session.record(chunk.len());
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.session.state.open_stages.fetch_sub(1, Ordering::AcqRel);
    }
}
