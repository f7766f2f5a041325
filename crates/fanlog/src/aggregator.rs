//! Single writer for the run's log file.
//!
//! The [`LogAggregator`] is the only component that ever opens the sink for
//! writing. It owns the file handle exclusively for the lifetime of the run,
//! so messages from concurrent workers cannot tear or interleave without any
//! lock around the write.
//!
//! Each message is written in full and flushed before the next one is taken
//! off the channel.

use crate::{Error, Result, message::LogEvent};
use std::path::PathBuf;
use tokio::{fs::File, io::AsyncWriteExt, sync::mpsc};
use tokio_util::sync::CancellationToken;

/// Lifecycle of the aggregator. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AggregatorState {
    Idle,
    Open,
    Waiting,
    Writing,
    Closed,
}

/// Why the aggregator stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AggregatorExit {
    /// The end-of-stream marker was consumed. This is the only normal exit.
    EndOfStream,
    /// The run was cancelled while waiting for the next message.
    Interrupted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct AggregatorReport {
    pub messages_written: u64,
    pub bytes_written: u64,
    pub exit: AggregatorExit,
}

pub(crate) struct LogAggregator {
    path: PathBuf,
    state: AggregatorState,
}

impl LogAggregator {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: AggregatorState::Idle,
        }
    }

    fn transition(&mut self, next: AggregatorState) {
        debug_assert_ne!(self.state, AggregatorState::Closed);
        #[cfg(feature = "tracing")]
        tracing::trace!("Aggregator {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Drains `rx` into the sink until the end-of-stream marker arrives.
    ///
    /// The sink is created fresh, truncating anything already at the path.
    /// Cancellation is only observed while waiting for the next message; a
    /// message already taken off the channel is always written and flushed.
    ///
    /// If every sender is dropped without an end-of-stream marker the
    /// aggregator treats it as an interruption.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sink`] when the file cannot be created, written or
    /// flushed. The receiver is dropped on return, so producers observe a
    /// closed channel.
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<LogEvent>,
        token: CancellationToken,
    ) -> Result<AggregatorReport> {
        let mut file = File::create(&self.path)
            .await
            .map_err(|e| Error::sink(&self.path, e))?;
        self.transition(AggregatorState::Open);

        let mut messages_written = 0_u64;
        let mut bytes_written = 0_u64;

        let exit = loop {
            self.transition(AggregatorState::Waiting);
            let event = tokio::select! {
                biased;
                () = token.cancelled() => break AggregatorExit::Interrupted,
                event = rx.recv() => event,
            };

            match event {
                Some(LogEvent::Data(text)) => {
                    self.transition(AggregatorState::Writing);
                    file.write_all(text.as_bytes())
                        .await
                        .map_err(|e| Error::sink(&self.path, e))?;
                    file.flush()
                        .await
                        .map_err(|e| Error::sink(&self.path, e))?;
                    messages_written += 1;
                    bytes_written += text.len() as u64;
                }
                Some(LogEvent::EndOfStream) => break AggregatorExit::EndOfStream,
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Log channel closed without an end-of-stream marker");
                    break AggregatorExit::Interrupted;
                }
            }
        };

        if exit == AggregatorExit::EndOfStream {
            file.sync_all()
                .await
                .map_err(|e| Error::sink(&self.path, e))?;
        }
        drop(file);
        self.transition(AggregatorState::Closed);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Aggregator closed {} after {} messages ({:?})",
            self.path.display(),
            messages_written,
            exit
        );

        Ok(AggregatorReport {
            messages_written,
            bytes_written,
            exit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::channel;

    #[tokio::test]
    async fn writes_until_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let (tx, rx) = channel();

        tx.send(LogEvent::Data("first\n".into())).unwrap();
        tx.send(LogEvent::Data("second\n".into())).unwrap();
        tx.send(LogEvent::EndOfStream).unwrap();
        tx.send(LogEvent::Data("after the marker\n".into())).unwrap();

        let report = LogAggregator::new(&path)
            .run(rx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.exit, AggregatorExit::EndOfStream);
        assert_eq!(report.messages_written, 2);
        assert_eq!(report.bytes_written, 13);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[tokio::test]
    async fn end_of_stream_text_is_plain_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let (tx, rx) = channel();

        tx.send(LogEvent::Data("EOF!!".into())).unwrap();
        tx.send(LogEvent::Data("EndOfStream\n".into())).unwrap();
        tx.send(LogEvent::EndOfStream).unwrap();

        let report = LogAggregator::new(&path)
            .run(rx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.messages_written, 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "EOF!!EndOfStream\n"
        );
    }

    #[tokio::test]
    async fn truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        std::fs::write(&path, "stale content that is longer\n").unwrap();

        let (tx, rx) = channel();
        tx.send(LogEvent::Data("new\n".into())).unwrap();
        tx.send(LogEvent::EndOfStream).unwrap();
        LogAggregator::new(&path)
            .run(rx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[tokio::test]
    async fn cancellation_stops_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let (tx, rx) = channel();
        let token = CancellationToken::new();

        tx.send(LogEvent::Data("kept\n".into())).unwrap();
        let handle = tokio::spawn(LogAggregator::new(&path).run(rx, token.clone()));

        // Wait for the queued line to land before cancelling.
        while std::fs::read_to_string(&path).unwrap_or_default() != "kept\n" {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        token.cancel();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.exit, AggregatorExit::Interrupted);
        assert_eq!(report.messages_written, 1);
        assert!(tx.is_closed());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept\n");
    }

    #[tokio::test]
    async fn dropped_senders_count_as_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let (tx, rx) = channel();
        tx.send(LogEvent::Data("only\n".into())).unwrap();
        drop(tx);

        let report = LogAggregator::new(&path)
            .run(rx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.exit, AggregatorExit::Interrupted);
        assert_eq!(report.messages_written, 1);
    }

    #[tokio::test]
    async fn missing_directory_is_a_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.log");
        let (_tx, rx) = channel();

        let err = LogAggregator::new(&path)
            .run(rx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Sink { path: p, .. } if p == path));
    }

    #[test]
    fn starts_idle() {
        let aggregator = LogAggregator::new("out.log");
        assert_eq!(aggregator.state, AggregatorState::Idle);
        assert_eq!(aggregator.path, PathBuf::from("out.log"));
    }
}
