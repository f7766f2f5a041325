#![doc = include_str!("../README.md")]

mod config;
mod payments;
mod processors;
mod store;
mod telemetry;

use clap::Parser;
use config::{CliArgs, LoaderConfig};
use fanlog::{Orchestrator, RunConfig, RunReport};
use processors::{InsertPayments, QueryPayments};
use telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = LoaderConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let result = run(&config).await;
    providers.shutdown();

    let report = result?;
    #[cfg(feature = "tracing")]
    tracing::info!(
        "{} records per worker, {} skipped, {} progress lines in {}",
        report.partition_size,
        report.unassigned_items,
        report.messages_written,
        config.logfile.display()
    );
    #[cfg(not(feature = "tracing"))]
    let _ = report;

    Ok(())
}

async fn run(config: &LoaderConfig) -> anyhow::Result<RunReport> {
    println!(
        "Using data dir {} (mode: {})",
        config.data_dir.display(),
        config.mode
    );

    let orchestrator = Orchestrator::new(RunConfig::new(
        config.procs,
        config.totalrec,
        &config.logfile,
    ));

    if config.doqueries {
        let query = QueryPayments::load(&config.data_dir, config.procs)?;
        let report = orchestrator.run(query.clone()).await?;
        if query.misses() > 0 {
            println!("{} queried records not found", query.misses());
        }
        Ok(report)
    } else {
        let report = orchestrator
            .run(InsertPayments {
                data_dir: config.data_dir.clone(),
                mode: config.mode,
            })
            .await?;
        Ok(report)
    }
}

fn log_startup_info(_config: &LoaderConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!("Starting loader with full config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting loader on {} (mode: {:?}) with {} workers",
            _config.data_dir.display(),
            _config.mode,
            _config.procs
        );
    }
}
