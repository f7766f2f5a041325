use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fanlog::{InterruptPolicy, Interrupted, Orchestrator, RunConfig, WorkerContext};
use tokio::runtime::Builder;

const TOTAL_MESSAGES: u64 = 100_000;

fn log_every_item(ctx: &WorkerContext) -> Result<(), Interrupted> {
    for item in ctx.partition().items() {
        ctx.log(format!(
            "worker {} item {item} - sample response time for one request: 0.042 ms",
            ctx.worker_index()
        ))?;
    }
    Ok(())
}

/// Throughput of the single writer with an increasing number of producers.
fn bench_fan_in(c: &mut Criterion) {
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let sink = dir.path().join("bench.log");

    let mut group = c.benchmark_group("fan_in");
    group.throughput(Throughput::Elements(TOTAL_MESSAGES));
    group.sample_size(10);

    for workers in [1_usize, 2, 4, 8, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &n| {
            let config = RunConfig::new(n, TOTAL_MESSAGES, &sink)
                .with_announce(false)
                .with_interrupt_policy(InterruptPolicy::Return);
            let orchestrator = Orchestrator::new(config);
            b.to_async(&runtime).iter(|| async {
                orchestrator
                    .run_until(log_every_item, core::future::pending())
                    .await
                    .expect("run failed")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fan_in);
criterion_main!(benches);
