//! Worker units running one partition of caller-supplied work each.
//!
//! Every worker runs on its own OS thread. The only thing it shares with the
//! rest of the run is its [`LogSender`] and the run's cancellation token.
//!
//! A work function that returns [`Interrupted`] ends its worker quietly. Any
//! other failure is the work function's business: it is expected to turn its
//! own errors into log messages. A panic that escapes simply ends the thread.
//! The orchestrator only waits for the thread to be gone and cannot tell
//! these cases apart.

use crate::{Interrupted, LogSender, WorkPartition};
use std::{io, sync::Arc, thread};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Everything a work function gets to see about its share of the run.
pub struct WorkerContext {
    partition: WorkPartition,
    sender: LogSender,
    token: CancellationToken,
}

impl WorkerContext {
    pub(crate) const fn new(
        partition: WorkPartition,
        sender: LogSender,
        token: CancellationToken,
    ) -> Self {
        Self {
            partition,
            sender,
            token,
        }
    }

    pub const fn partition(&self) -> &WorkPartition {
        &self.partition
    }

    pub const fn worker_index(&self) -> usize {
        self.partition.worker_index
    }

    pub const fn worker_count(&self) -> usize {
        self.partition.worker_count
    }

    pub const fn partition_size(&self) -> u64 {
        self.partition.partition_size
    }

    /// Channel into the shared log file.
    pub const fn sender(&self) -> &LogSender {
        &self.sender
    }

    /// Shorthand for `self.sender().send_line(text)`.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] once the aggregator has stopped.
    pub fn log(&self, text: impl Into<String>) -> Result<(), Interrupted> {
        self.sender.send_line(text)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Suspension point for long-running work functions.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] once the run has been cancelled, so the work
    /// function can bail out with `?`.
    pub fn checkpoint(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

/// The unit of work run once per worker.
///
/// Implementations must bound their own loop to
/// [`partition_size`](WorkerContext::partition_size) iterations and handle
/// their own per-item errors. Extra arguments are carried by the
/// implementing type or captured by the closure.
pub trait WorkFn: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns [`Interrupted`] to stop the worker early and silently.
    fn run(&self, ctx: &WorkerContext) -> Result<(), Interrupted>;
}

impl<F> WorkFn for F
where
    F: Fn(&WorkerContext) -> Result<(), Interrupted> + Send + Sync + 'static,
{
    fn run(&self, ctx: &WorkerContext) -> Result<(), Interrupted> {
        self(ctx)
    }
}

/// A constructed but not yet started worker.
pub(crate) struct WorkerUnit {
    ctx: WorkerContext,
    work: Arc<dyn WorkFn>,
}

impl WorkerUnit {
    pub(crate) fn new(
        partition: WorkPartition,
        sender: LogSender,
        token: CancellationToken,
        work: Arc<dyn WorkFn>,
    ) -> Self {
        Self {
            ctx: WorkerContext::new(partition, sender, token),
            work,
        }
    }

    pub(crate) const fn worker_index(&self) -> usize {
        self.ctx.worker_index()
    }

    /// Spawns the worker thread and invokes the work function exactly once.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the thread cannot be spawned.
    pub(crate) fn start(self) -> io::Result<WorkerHandle> {
        let worker_index = self.worker_index();
        let (exited_tx, exited_rx) = oneshot::channel::<()>();

        thread::Builder::new()
            .name(format!("fanlog-worker-{worker_index}"))
            .spawn(move || {
                // Dropped on every exit path, including unwinding, which is
                // what resolves `WorkerHandle::terminated`.
                let _exited = exited_tx;
                run_worker(&self.ctx, self.work.as_ref());
            })?;

        Ok(WorkerHandle { exited: exited_rx })
    }
}

fn run_worker(ctx: &WorkerContext, work: &dyn WorkFn) {
    #[cfg(feature = "tracing")]
    tracing::trace!(
        "Worker {} started ({} items)",
        ctx.worker_index(),
        ctx.partition_size()
    );

    match work.run(ctx) {
        Ok(()) => {
            #[cfg(feature = "tracing")]
            tracing::trace!("Worker {} stopped", ctx.worker_index());
        }
        Err(Interrupted) => {}
    }
}

/// Handle to a started worker thread.
pub(crate) struct WorkerHandle {
    exited: oneshot::Receiver<()>,
}

impl WorkerHandle {
    /// Resolves once the worker thread has ended, whatever the reason.
    pub(crate) async fn terminated(self) {
        // The sender is never used, so this only ever resolves to `Err` when
        // the thread drops it.
        let _ = self.exited.await;
    }
}
