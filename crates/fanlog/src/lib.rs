#![doc = include_str!("../README.md")]

mod aggregator;
mod config;
mod error;
mod message;
mod orchestrator;
mod partition;
mod worker;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::message::LogSender;
pub use crate::orchestrator::{Orchestrator, RunOutcome, RunReport, run_data_processors};
pub use crate::partition::*;
pub use crate::worker::{WorkFn, WorkerContext};
