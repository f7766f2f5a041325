//! Work functions run by each worker of the loader.
//!
//! Both processors own their failures: an insert error is reported on the
//! console and stops that worker's loop, and the rest of the run carries on.
//! Lookups never fail; a missing record is reported and counted. Progress is sampled roughly once per percent of the worker's
//! partition and pushed into the shared log file.

use crate::{
    payments::{PaymentRecord, record_id},
    store::{Mode, RecordIndex, RecordWriter},
    telemetry::{increment_record_errors, increment_records_processed, record_request_latency},
};
use chrono::Local;
use fanlog::{Interrupted, WorkFn, WorkerContext};
use rand::Rng;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

/// Decides which iterations emit a progress line: every
/// `max(partition_size / 100, 1)`-th, starting with the first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sampler {
    partition_size: u64,
    interval: u64,
}

impl Sampler {
    pub fn new(partition_size: u64) -> Self {
        Self {
            partition_size,
            interval: (partition_size / 100).max(1),
        }
    }

    pub const fn is_sample(&self, count: u64) -> bool {
        count % self.interval == 0
    }

    pub const fn percent(&self, count: u64) -> u64 {
        if self.partition_size == 0 {
            0
        } else {
            count * 100 / self.partition_size
        }
    }

    /// The progress line logged for a sampled iteration.
    pub fn line(&self, verb: &str, count: u64, dataset_id: usize, latency_ms: f64) -> String {
        format!(
            "{}% - {count} documents {verb} for data set id {dataset_id} - {} - sample response \
             time for one request: {latency_ms} ms\n",
            self.percent(count),
            Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
        )
    }
}

fn report_failure(action: &str, _err: &anyhow::Error) {
    increment_record_errors();
    #[cfg(feature = "tracing")]
    tracing::error!("Terminating due to error whilst performing {action}: {_err:#}");
    #[cfg(not(feature = "tracing"))]
    eprintln!("Terminating due to error whilst performing {action}:\n{_err:?}");
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Generates and appends `partition_size` random payment records to the
/// worker's own dataset file.
#[derive(Clone, Debug)]
pub struct InsertPayments {
    pub data_dir: PathBuf,
    pub mode: Mode,
}

impl WorkFn for InsertPayments {
    fn run(&self, ctx: &WorkerContext) -> Result<(), Interrupted> {
        let dataset_id = ctx.worker_index();
        let mut writer = match RecordWriter::create(&self.data_dir, dataset_id, self.mode) {
            Ok(writer) => writer,
            Err(e) => {
                report_failure("inserts", &e);
                return Ok(());
            }
        };

        let mut rng = rand::rng();
        let sampler = Sampler::new(ctx.partition_size());

        for count in 0..ctx.partition_size() {
            ctx.checkpoint()?;
            let record = PaymentRecord::random(dataset_id, count, &mut rng);

            let started = Instant::now();
            if let Err(e) = writer.insert(&record) {
                report_failure("inserts", &e);
                break;
            }
            let latency_ms = elapsed_ms(started);
            increment_records_processed();
            record_request_latency(latency_ms);

            if sampler.is_sample(count) {
                ctx.sender()
                    .send(sampler.line("inserted", count, dataset_id, latency_ms))?;
            }
        }

        if let Err(e) = writer.finish() {
            report_failure("inserts", &e);
        }
        Ok(())
    }
}

/// Looks up `partition_size` random record ids across every worker's
/// dataset.
///
/// The store is loaded once, up front, and shared by every worker.
#[derive(Clone, Debug)]
pub struct QueryPayments {
    index: Arc<RecordIndex>,
    misses: Arc<AtomicU64>,
}

impl QueryPayments {
    /// Loads the datasets written by `dataset_count` insert workers.
    pub fn load(data_dir: &Path, dataset_count: usize) -> anyhow::Result<Self> {
        let index = RecordIndex::load(data_dir, dataset_count)?;
        if index.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::warn!("No records found in {}", data_dir.display());
            #[cfg(not(feature = "tracing"))]
            println!("No records found in {}", data_dir.display());
        }
        Ok(Self::from_index(index))
    }

    pub fn from_index(index: RecordIndex) -> Self {
        Self {
            index: Arc::new(index),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Lookups that found no record, summed over every worker.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl WorkFn for QueryPayments {
    fn run(&self, ctx: &WorkerContext) -> Result<(), Interrupted> {
        let dataset_id = ctx.worker_index();
        let mut rng = rand::rng();
        let sampler = Sampler::new(ctx.partition_size());

        for count in 0..ctx.partition_size() {
            ctx.checkpoint()?;
            let doc_id = record_id(
                rng.random_range(0..ctx.worker_count()),
                rng.random_range(0..ctx.partition_size()),
            );

            let started = Instant::now();
            let found = self.index.find_one(&doc_id);
            let latency_ms = elapsed_ms(started);
            increment_records_processed();
            record_request_latency(latency_ms);

            if found.is_none() {
                self.misses.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::warn!("Queried record not found for _id: {doc_id}");
                #[cfg(not(feature = "tracing"))]
                println!("Queried record not found for _id: {doc_id}");
            }

            if sampler.is_sample(count) {
                ctx.sender()
                    .send(sampler.line("queried", count, dataset_id, latency_ms))?;
            }
        }

        Ok(())
    }
}
