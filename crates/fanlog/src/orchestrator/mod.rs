//! Runs a partitioned job across parallel workers with one log writer.
//!
//! A run goes through these steps in order:
//!
//! 1. Validate the [`RunConfig`] and compute the partitions.
//! 2. Remove any stale sink file.
//! 3. Start the log aggregator on the receiving end of the log channel.
//! 4. Construct every worker unit, then start them all.
//! 5. Wait for each worker thread to end, in start order.
//! 6. Send the single end-of-stream marker and wait for the aggregator.
//!
//! The end-of-stream marker is only sent after every worker has been joined,
//! so the aggregator can never close the sink while a worker is still
//! producing.
//!
//! Steps 5 and 6 race against the interrupt future. When it fires the
//! [`InterruptPolicy`] decides between ending the process on the spot and
//! cancelling the run and returning.


use crate::{
    Error, InterruptPolicy, LogSender, Result, RunConfig, WorkFn,
    aggregator::{AggregatorExit, AggregatorReport, LogAggregator},
    message::{LogEvent, channel},
    partition::{partition_size, partitions, unassigned_items},
    worker::{WorkerHandle, WorkerUnit},
};
use core::{future::Future, time::Duration};
use std::{io, path::Path, sync::Arc, time::Instant};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every worker terminated and the aggregator consumed the end-of-stream
    /// marker. Says nothing about whether the work functions succeeded.
    Completed,
    /// The interrupt fired under [`InterruptPolicy::Return`].
    Interrupted,
}

/// Summary of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub total_items: u64,
    pub worker_count: usize,
    pub partition_size: u64,
    /// Items dropped by the partitioning remainder, never processed.
    pub unassigned_items: u64,
    pub messages_written: u64,
    pub bytes_written: u64,
    pub elapsed: Duration,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

/// Drives a single run described by a [`RunConfig`].
#[derive(Clone, Debug)]
pub struct Orchestrator {
    config: RunConfig,
}

impl Orchestrator {
    pub const fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs `work` once per worker, treating Ctrl+C (and SIGTERM on unix) as
    /// the interrupt.
    ///
    /// The signal handlers are installed before the stale sink is touched, so
    /// an early Ctrl+C still gets the interrupt notice.
    ///
    /// # Errors
    ///
    /// See [`run_until`](Self::run_until).
    pub async fn run<W: WorkFn>(&self, work: W) -> Result<RunReport> {
        self.run_until(work, interrupt_signal()).await
    }

    /// Runs `work` once per worker, treating completion of `interrupt` as the
    /// interrupt.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] before anything is touched.
    /// - [`Error::Sink`] if the stale sink cannot be removed or the new one
    ///   cannot be written.
    /// - [`Error::Spawn`] if a worker thread cannot be started. Workers
    ///   already started are cancelled.
    /// - [`Error::Aggregator`] if the aggregator task dies.
    ///
    /// Failures inside `work` are never reported here.
    pub async fn run_until<W, I>(&self, work: W, interrupt: I) -> Result<RunReport>
    where
        W: WorkFn,
        I: Future<Output = ()>,
    {
        self.config.validate()?;
        let config = &self.config;
        let parts = partitions(config.total_items, config.worker_count)?;
        let partition_size = partition_size(config.total_items, config.worker_count)?;
        let unassigned_items = unassigned_items(config.total_items, config.worker_count)?;

        remove_stale_sink(config.sink_path()).await?;

        if config.announce {
            println!();
            println!(
                "Running {} workers over {} items, check file '{}' for progress information",
                config.worker_count,
                config.total_items,
                config.sink_path().display()
            );
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting {} workers with {} items each ({} unassigned)",
            config.worker_count,
            partition_size,
            unassigned_items
        );

        let started = Instant::now();
        let token = CancellationToken::new();
        let (tx, rx) = channel();

        let mut aggregator =
            tokio::spawn(LogAggregator::new(config.sink_path()).run(rx, token.clone()));

        let work: Arc<dyn WorkFn> = Arc::new(work);
        let units: Vec<WorkerUnit> = parts
            .into_iter()
            .map(|partition| {
                WorkerUnit::new(
                    partition,
                    LogSender::new(tx.clone()),
                    token.clone(),
                    Arc::clone(&work),
                )
            })
            .collect();
        drop(work);

        let mut interrupt = core::pin::pin!(interrupt);

        // === Phase 1: Start every worker, then join them in start order ===
        let joined = tokio::select! {
            biased;
            () = &mut interrupt => None,
            joined = start_and_join(units) => Some(joined),
        };

        match joined {
            None => {
                return self
                    .interrupted(&token, aggregator, started, partition_size, unassigned_items)
                    .await;
            }
            Some(Err(e)) => {
                token.cancel();
                return Err(e);
            }
            Some(Ok(())) => {}
        }

        // === Phase 2: Close the stream and wait for the aggregator ===
        if tx.send(LogEvent::EndOfStream).is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Aggregator stopped before the end-of-stream marker");
        }
        drop(tx);

        let aggregated = tokio::select! {
            biased;
            () = &mut interrupt => None,
            aggregated = &mut aggregator => Some(aggregated),
        };

        let Some(aggregated) = aggregated else {
            return self
                .interrupted(&token, aggregator, started, partition_size, unassigned_items)
                .await;
        };
        let aggregated = flatten_join(aggregated)?;
        debug_assert_eq!(aggregated.exit, AggregatorExit::EndOfStream);
        let elapsed = started.elapsed();

        if config.announce {
            println!(
                "{} items processed by {} workers in {} seconds",
                config.total_items,
                config.worker_count,
                elapsed.as_secs()
            );
            println!();
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Run completed in {:?} with {} log messages",
            elapsed,
            aggregated.messages_written
        );

        Ok(self.report(
            partition_size,
            unassigned_items,
            &aggregated,
            elapsed,
            RunOutcome::Completed,
        ))
    }

    async fn interrupted(
        &self,
        token: &CancellationToken,
        aggregator: JoinHandle<Result<AggregatorReport>>,
        started: Instant,
        partition_size: u64,
        unassigned_items: u64,
    ) -> Result<RunReport> {
        println!(
            "\nInterrupted - view file \"{}\"\n",
            self.config.sink_path().display()
        );

        if self.config.interrupt_policy == InterruptPolicy::ExitProcess {
            std::process::exit(0);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling workers and aggregator");
        token.cancel();

        let aggregated = flatten_join(aggregator.await)?;

        Ok(self.report(
            partition_size,
            unassigned_items,
            &aggregated,
            started.elapsed(),
            RunOutcome::Interrupted,
        ))
    }

    fn report(
        &self,
        partition_size: u64,
        unassigned_items: u64,
        aggregated: &AggregatorReport,
        elapsed: Duration,
        outcome: RunOutcome,
    ) -> RunReport {
        RunReport {
            total_items: self.config.total_items,
            worker_count: self.config.worker_count,
            partition_size,
            unassigned_items,
            messages_written: aggregated.messages_written,
            bytes_written: aggregated.bytes_written,
            elapsed,
            outcome,
        }
    }
}

/// Runs `work` across `worker_count` workers on a fresh multi-threaded
/// runtime, blocking until the run is over.
///
/// Uses the default [`RunConfig`]: banner and summary on stdout, and Ctrl+C
/// ends the process.
///
/// # Errors
///
/// See [`Orchestrator::run_until`]. Also returns [`Error::Spawn`] when the
/// runtime cannot be built.
pub fn run_data_processors<W: WorkFn>(
    worker_count: usize,
    total_items: u64,
    sink_path: impl AsRef<Path>,
    work: W,
) -> Result<RunReport> {
    let config = RunConfig::new(worker_count, total_items, sink_path.as_ref());
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::spawn("failed to build runtime", e))?;

    runtime.block_on(Orchestrator::new(config).run(work))
}

/// Starts every constructed unit, then waits for all of them to end.
///
/// A unit that fails to start cancels nothing by itself; the caller cancels
/// the token so the already running workers can wind down.
async fn start_and_join(units: Vec<WorkerUnit>) -> Result<()> {
    let mut handles: Vec<WorkerHandle> = Vec::with_capacity(units.len());
    for unit in units {
        let worker_index = unit.worker_index();
        let handle = unit
            .start()
            .map_err(|e| Error::spawn(format!("failed to start worker {worker_index}"), e))?;
        handles.push(handle);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("All {} workers started", handles.len());

    for handle in handles {
        handle.terminated().await;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("All workers terminated");
    Ok(())
}

fn flatten_join(
    joined: core::result::Result<Result<AggregatorReport>, JoinError>,
) -> Result<AggregatorReport> {
    joined.map_err(|e| Error::Aggregator {
        context: e.to_string(),
    })?
}

async fn remove_stale_sink(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            #[cfg(feature = "tracing")]
            tracing::debug!("Removed stale sink {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::sink(path, e)),
    }
}

/// Resolves on Ctrl+C or SIGTERM. Both handlers are installed by this call,
/// not on first poll. A signal whose handler cannot be installed never fires.
#[cfg(unix)]
fn interrupt_signal() -> impl Future<Output = ()> {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    async fn recv(signal: Option<Signal>) {
        match signal {
            Some(mut signal) => {
                signal.recv().await;
            }
            None => core::future::pending::<()>().await,
        }
    }

    let listen = |kind: SignalKind| match signal(kind) {
        Ok(signal) => Some(signal),
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to install {kind:?} handler: {_e}");
            None
        }
    };
    let ctrl_c = listen(SignalKind::interrupt());
    let terminate = listen(SignalKind::terminate());

    async move {
        tokio::select! {
            () = recv(ctrl_c) => {
                #[cfg(feature = "tracing")]
                tracing::info!("Received Ctrl+C signal");
            },
            () = recv(terminate) => {
                #[cfg(feature = "tracing")]
                tracing::info!("Received SIGTERM signal");
            },
        }
    }
}

/// Resolves on Ctrl+C. Never resolves if no handler can be installed.
#[cfg(not(unix))]
fn interrupt_signal() -> impl Future<Output = ()> {
    async {
        if let Err(_e) = tokio::signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to install Ctrl+C handler: {_e}");
            core::future::pending::<()>().await;
        }
        #[cfg(feature = "tracing")]
        tracing::info!("Received Ctrl+C signal");
    }
}
