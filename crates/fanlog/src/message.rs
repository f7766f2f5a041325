//! The channel connecting every producer to the log aggregator.
//!
//! The channel is an unbounded tokio MPSC queue. Each producer's messages
//! arrive in the order it sent them; messages from different producers may
//! interleave arbitrarily. A message is either delivered whole or not at all.

use crate::Interrupted;
use tokio::sync::mpsc;

/// Payload travelling over the log channel.
///
/// `EndOfStream` is sent exactly once per run by the orchestrator after every
/// worker has terminated. Work functions only ever get a [`LogSender`], which
/// cannot produce it.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LogEvent {
    Data(String),
    EndOfStream,
}

pub(crate) fn channel() -> (
    mpsc::UnboundedSender<LogEvent>,
    mpsc::UnboundedReceiver<LogEvent>,
) {
    mpsc::unbounded_channel()
}

/// Handle used by work functions to push free-form text into the log file.
///
/// Cloning is cheap. Sending never blocks.
#[derive(Clone, Debug)]
pub struct LogSender {
    tx: mpsc::UnboundedSender<LogEvent>,
}

impl LogSender {
    pub(crate) const fn new(tx: mpsc::UnboundedSender<LogEvent>) -> Self {
        Self { tx }
    }

    /// Queues `text` to be written to the sink verbatim.
    ///
    /// The producer owns line termination, see [`send_line`](Self::send_line).
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when the aggregator has already stopped, which
    /// only happens once the run has been cancelled or the sink failed.
    pub fn send(&self, text: impl Into<String>) -> Result<(), Interrupted> {
        self.tx
            .send(LogEvent::Data(text.into()))
            .map_err(|_| Interrupted)
    }

    /// Like [`send`](Self::send), appending a trailing newline when `text`
    /// lacks one.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when the aggregator has already stopped.
    pub fn send_line(&self, text: impl Into<String>) -> Result<(), Interrupted> {
        let mut text = text.into();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        self.send(text)
    }

    /// Whether the aggregator has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
