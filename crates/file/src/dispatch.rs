//! Delivery of callbacks and progress events on the host's main context.
//!
//! Callback-style entry points never call back from a runtime worker. They
//! hand the call to a [`MainDispatcher`], which decides where it runs: a
//! [`ChannelDispatcher`] queues it for the host's [`MainLoop`], an
//! [`ImmediateDispatcher`] runs it inline.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::warn;
use transfer::ProgressFn;

use crate::error::Result;
use crate::queue::QueuedTask;

/// A unit of work to run on the main context.
pub type MainTask = Box<dyn FnOnce() + Send + 'static>;

pub trait MainDispatcher: Send + Sync + 'static {
    /// Run `task` on the main context, at some point after this call.
    fn run_on_main(&self, task: MainTask);
}

/// Runs tasks on whichever thread dispatches them.
///
/// For hosts without a distinguished main thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDispatcher;

impl MainDispatcher for ImmediateDispatcher {
    fn run_on_main(&self, task: MainTask) {
        task();
    }
}

/// Sends tasks to a [`MainLoop`] drained by the host's main thread.
///
/// Cheap to clone; every clone feeds the same loop.
#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: flume::Sender<MainTask>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the loop that runs what it sends.
    pub fn new() -> (Self, MainLoop) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, MainLoop { rx })
    }
}

impl MainDispatcher for ChannelDispatcher {
    fn run_on_main(&self, task: MainTask) {
        if self.tx.send(task).is_err() {
            warn!("main loop is gone, dropping callback");
        }
    }
}

impl fmt::Debug for ChannelDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelDispatcher")
            .field("queued", &self.tx.len())
            .finish()
    }
}

/// Receiving end of a [`ChannelDispatcher`].
pub struct MainLoop {
    rx: flume::Receiver<MainTask>,
}

impl MainLoop {
    /// Run tasks until every dispatcher has been dropped.
    pub fn run(self) {
        while let Ok(task) = self.rx.recv() {
            task();
        }
    }

    /// Run the tasks queued right now without waiting for more.
    ///
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait for the next task and run it.
    ///
    /// Returns false once every dispatcher has been dropped.
    pub async fn run_next(&self) -> bool {
        match self.rx.recv_async().await {
            Ok(task) => {
                task();
                true
            }
            Err(_) => false,
        }
    }
}

impl fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoop")
            .field("queued", &self.rx.len())
            .finish()
    }
}

/// Wrap a progress listener so every event is delivered on the main context.
pub(crate) fn progress_on_main(
    dispatcher: Arc<dyn MainDispatcher>,
    progress: ProgressFn,
) -> ProgressFn {
    Arc::new(move |event| {
        let progress = progress.clone();
        dispatcher.run_on_main(Box::new(move || progress(event)));
    })
}

/// Hand the result of `task` to `callback` on the main context, exactly once.
pub(crate) fn deliver_on_main<T, F>(
    runtime: &Handle,
    dispatcher: Arc<dyn MainDispatcher>,
    task: QueuedTask<T>,
    callback: F,
) where
    T: Send + 'static,
    F: FnOnce(Result<T>) + Send + 'static,
{
    runtime.spawn(async move {
        let result = task.await;
        dispatcher.run_on_main(Box::new(move || callback(result)));
    });
}
