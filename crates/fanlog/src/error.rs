//! Error types for the orchestrator.
//!
//! These are the failures that can reach a caller:
//! - `InvalidConfig`: the run was rejected before any file was touched or any
//!   worker was spawned.
//! - `Sink`: the log file could not be removed, created or written.
//! - `Spawn`: a worker thread or the runtime could not be started.
//! - `Aggregator`: the aggregator task died without reporting back.
//!
//! Cancellation is not an error. It is reported as
//! [`RunOutcome::Interrupted`](crate::RunOutcome::Interrupted) or ends the
//! process outright. Failures inside a work function never cross the worker
//! boundary.

use std::{io, path::PathBuf};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for orchestrated runs.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The run configuration was rejected up front.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The log sink could not be prepared or written.
    #[error("Log sink error on {}: {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The operating system refused to start a thread or runtime.
    #[error("Spawn error: {context}: {source}")]
    Spawn {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The aggregator task panicked or was aborted.
    #[error("Aggregator error: {context}")]
    Aggregator { context: String },
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn sink(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Sink {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn spawn(context: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            context: context.into(),
            source,
        }
    }
}

/// Returned from a work function, or from [`WorkerContext`] helpers, once the
/// run has been cancelled.
///
/// The worker wrapper treats it as a request to stop quietly: nothing is
/// logged and nothing propagates past the worker.
///
/// [`WorkerContext`]: crate::WorkerContext
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[error("run interrupted")]
pub struct Interrupted;
