//! Per-handle FIFO of asynchronous units of work.
//!
//! Each unit is handed a [`Predecessor`] that resolves once every unit enqueued
//! before it has reached a terminal state (success, failure, cancellation or
//! being dropped). Units do their synchronous setup right away and await the
//! predecessor before touching shared state, so side effects happen in
//! submission order no matter how long each unit takes.
//!
//! The queue's tail is the completion of the newest unit joined with its own
//! predecessor: a unit only signals its successor after both its work and
//! everything ahead of it are done. A unit that finishes early, say because it
//! was cancelled, therefore can't let later units overtake a predecessor that
//! is still running.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::error;

use crate::error::{FileError, Result};

/// A unit's completion: a shareable future plus a flag that is set before
/// the future resolves, so it can be read without polling.
#[derive(Clone)]
struct Signal {
    finished: Arc<AtomicBool>,
    future: Shared<BoxFuture<'static, ()>>,
}

impl Signal {
    fn pending(rx: oneshot::Receiver<()>) -> Self {
        Self {
            finished: Arc::new(AtomicBool::new(false)),
            future: rx.map(|_| ()).boxed().shared(),
        }
    }

    fn completed() -> Self {
        Self {
            finished: Arc::new(AtomicBool::new(true)),
            future: future::ready(()).boxed().shared(),
        }
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl Future for Signal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.future.poll_unpin(cx)
    }
}

/// Completion signal of everything enqueued ahead of a unit.
///
/// Resolves to `()` whatever the outcome of those units was.
#[derive(Clone)]
pub struct Predecessor {
    signal: Signal,
}

impl Predecessor {
    /// Whether everything ahead of the unit is already terminal.
    pub fn is_finished(&self) -> bool {
        self.signal.is_finished()
    }
}

impl Future for Predecessor {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.signal.poll_unpin(cx)
    }
}

impl fmt::Debug for Predecessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predecessor")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Result of a queued unit. Resolves exactly once.
///
/// The unit runs on the queue's runtime whether or not this is polled;
/// dropping it only discards the result.
#[must_use = "dropping a queued task discards its result, not the work"]
pub struct QueuedTask<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> QueuedTask<T> {
    /// Block the current thread until the unit finishes.
    ///
    /// For synchronous callers only. Calling this from a runtime worker
    /// thread can deadlock the runtime.
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for QueuedTask<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T>> {
        match ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(_) => Poll::Ready(Err(FileError::Aborted)),
        }
    }
}

impl<T> fmt::Debug for QueuedTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedTask").finish_non_exhaustive()
    }
}

/// FIFO of units of work that run one after another on a runtime.
pub struct TaskQueue {
    runtime: Handle,
    tail: Mutex<Option<Signal>>,
}

impl TaskQueue {
    /// Create an empty queue whose units run on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tail: Mutex::new(None),
        }
    }

    /// Admit a unit of work.
    ///
    /// `start` is called immediately on the caller's thread with the unit's
    /// predecessor, and must return the unit's future without blocking. That
    /// future is spawned on the queue's runtime. A `start` that panics counts
    /// as a unit that failed immediately with [`FileError::Aborted`].
    pub fn enqueue<T, F, Fut>(&self, start: F) -> QueuedTask<T>
    where
        F: FnOnce(Predecessor) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let done = Signal::pending(done_rx);
        let finished = done.finished.clone();

        let previous = {
            let mut tail = self.tail.lock();
            let previous = tail.take().unwrap_or_else(Signal::completed);
            *tail = Some(done);
            previous
        };

        let predecessor = Predecessor {
            signal: previous.clone(),
        };
        let work = match std::panic::catch_unwind(AssertUnwindSafe(|| start(predecessor))) {
            Ok(work) => work.boxed(),
            Err(_) => {
                error!("queued unit panicked during setup");
                future::ready(Err(FileError::Aborted)).boxed()
            }
        };

        let (result_tx, result_rx) = oneshot::channel();
        self.runtime.spawn(async move {
            let result = AssertUnwindSafe(work)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    error!("queued unit panicked");
                    Err(FileError::Aborted)
                });
            let _ = result_tx.send(result);

            // This unit is terminal for its successors only once everything
            // ahead of it is too, even if it returned without waiting.
            previous.await;
            finished.store(true, Ordering::Release);
            let _ = done_tx.send(());
        });

        QueuedTask { rx: result_rx }
    }

    /// Resolves once every unit enqueued so far is terminal.
    pub async fn finished(&self) {
        let tail = self.tail.lock().clone();
        if let Some(tail) = tail {
            tail.await;
        }
    }

    /// Block the current thread until every unit enqueued so far is terminal.
    ///
    /// Returns immediately on an empty queue. Same threading caveat as
    /// [`QueuedTask::wait`].
    pub fn wait_until_finished(&self) {
        let tail = self.tail.lock().clone();
        if let Some(tail) = tail {
            futures::executor::block_on(tail);
        }
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let idle = self
            .tail
            .lock()
            .as_ref()
            .map_or(true, Signal::is_finished);
        f.debug_struct("TaskQueue").field("idle", &idle).finish()
    }
}
