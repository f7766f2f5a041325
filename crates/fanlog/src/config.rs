use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// What the orchestrator does when the run is interrupted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InterruptPolicy {
    /// Print the notice and end the process immediately with status 0.
    ///
    /// Nothing is unwound: resources held by work functions (connections,
    /// open files) are left to the operating system.
    #[default]
    ExitProcess,
    /// Print the notice, cancel every worker and return
    /// [`RunOutcome::Interrupted`](crate::RunOutcome::Interrupted).
    ///
    /// Worker threads that never reach a checkpoint keep running in the
    /// background.
    Return,
}

/// Settings for a single orchestrated run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub worker_count: usize,
    pub total_items: u64,
    pub sink_path: PathBuf,
    /// Print the start banner and the closing summary on stdout.
    pub announce: bool,
    pub interrupt_policy: InterruptPolicy,
}

impl RunConfig {
    pub fn new(worker_count: usize, total_items: u64, sink_path: impl Into<PathBuf>) -> Self {
        Self {
            worker_count,
            total_items,
            sink_path: sink_path.into(),
            announce: true,
            interrupt_policy: InterruptPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_announce(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }

    #[must_use]
    pub const fn with_interrupt_policy(mut self, policy: InterruptPolicy) -> Self {
        self.interrupt_policy = policy;
        self
    }

    pub fn sink_path(&self) -> &Path {
        &self.sink_path
    }

    /// Checks the configuration before anything is touched on disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when there are no workers or no sink
    /// path.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::invalid_config("worker count must be greater than 0"));
        }
        if self.sink_path.as_os_str().is_empty() {
            return Err(Error::invalid_config("sink path must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RunConfig::new(2, 10, "out.log");
        assert!(config.announce);
        assert_eq!(config.interrupt_policy, InterruptPolicy::ExitProcess);
        assert_eq!(config.sink_path(), Path::new("out.log"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders() {
        let config = RunConfig::new(2, 10, "out.log")
            .with_announce(false)
            .with_interrupt_policy(InterruptPolicy::Return);
        assert!(!config.announce);
        assert_eq!(config.interrupt_policy, InterruptPolicy::Return);
    }

    #[test]
    fn rejects_zero_workers() {
        let err = RunConfig::new(0, 10, "out.log").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn rejects_empty_sink_path() {
        let err = RunConfig::new(1, 10, "").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
