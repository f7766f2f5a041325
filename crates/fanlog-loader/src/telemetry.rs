//! # Telemetry Features
//!
//! Console logging is always installed through `tracing_subscriber`. Which
//! events reach it depends on the cargo features:
//!
//! - `tracing`: enables the `tracing` call sites in this binary and in
//!   `fanlog`.
//! - `metrics`: enables OpenTelemetry metrics (record counters and a request
//!   latency histogram), exported periodically to stdout.
//!
//! The log level is taken from `RUST_LOG` and defaults to `info`.
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin fanlog-loader --features tracing,metrics -- -p 4 -t 10000
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::{Resource, metrics as sdkmetrics};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and stops the exporters. Errors are reported on stderr because
    /// the subscriber may already be unusable at this point.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_names(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        );

    registry.try_init()?;

    #[cfg(feature = "metrics")]
    {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        init_metric_handles(&opentelemetry::global::meter("fanlog-loader"));
    }

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    use opentelemetry_stdout::MetricExporter;

    let resource = Resource::builder()
        .with_service_name("fanlog-loader")
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();
    let reader = sdkmetrics::PeriodicReader::builder(MetricExporter::default())
        .with_interval(std::time::Duration::from_secs(5))
        .build();

    sdkmetrics::SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build()
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static RECORDS_PROCESSED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static RECORD_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static REQUEST_LATENCY_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = RECORDS_PROCESSED.set(
        meter
            .u64_counter("records_processed")
            .with_description("Payment records inserted or queried")
            .build(),
    );

    let _ = RECORD_ERRORS.set(
        meter
            .u64_counter("record_errors")
            .with_description("Failed inserts or queries that stopped a worker")
            .build(),
    );

    let _ = REQUEST_LATENCY_MS.set(
        meter
            .f64_histogram("request_latency")
            .with_unit("ms")
            .with_description("Latency of a single insert or lookup")
            .build(),
    );
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn increment_records_processed() {
    if let Some(counter) = RECORDS_PROCESSED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_records_processed() {}

#[cfg(feature = "metrics")]
pub fn increment_record_errors() {
    if let Some(counter) = RECORD_ERRORS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_record_errors() {}

#[cfg(feature = "metrics")]
pub fn record_request_latency(latency_ms: f64) {
    if let Some(histogram) = REQUEST_LATENCY_MS.get() {
        histogram.record(latency_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_request_latency(_latency_ms: f64) {}
