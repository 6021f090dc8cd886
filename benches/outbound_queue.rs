//! Hot-path benchmark suite.
//!
//! Benchmarks the synchronous core at different scales:
//! - Queue capacities: 100, 1000, 10000
//! - Backoff attempts: 0..32
//! - Offline send followed by a full flush
//!
//! Run with: cargo bench --bench outbound_queue
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use ws_lifeline::connection::{Action, BackoffPolicy, OutboundQueue, StateMachine};
use ws_lifeline::{ManagerConfig, Payload, SendOptions};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const QUEUE_CAPACITIES: &[usize] = &[100, 1_000, 10_000];
const TTL: Duration = Duration::from_secs(300);

// ============================================================================
// Benchmark: Queue Push With Overflow
// ============================================================================

fn bench_queue_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push");

    for &capacity in QUEUE_CAPACITIES {
        group.bench_with_input(
            BenchmarkId::new("overflow", capacity),
            &capacity,
            |b, &capacity| {
                let now = Instant::now();
                b.iter(|| {
                    let mut queue = OutboundQueue::new(capacity, TTL);
                    for i in 0..capacity * 2 {
                        queue.push(Payload::text(format!("m{i}")), None, now);
                    }
                    black_box(queue.len())
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: Queue Drain
// ============================================================================

fn bench_queue_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_drain");

    for &capacity in QUEUE_CAPACITIES {
        group.bench_with_input(BenchmarkId::new("live", capacity), &capacity, |b, &capacity| {
            let start = Instant::now();
            b.iter(|| {
                let mut queue = OutboundQueue::new(capacity, TTL);
                for i in 0..capacity {
                    // Half the entries expire before the drain.
                    let at = if i % 2 == 0 { start } else { start + TTL };
                    queue.push(Payload::text("m"), None, at);
                }
                black_box(queue.drain_live(start + TTL + Duration::from_secs(1)))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Backoff Delay
// ============================================================================

fn bench_backoff(c: &mut Criterion) {
    let policy = BackoffPolicy::new(
        Duration::from_millis(1_000),
        Duration::from_millis(30_000),
        1.5,
        Duration::from_millis(1_000),
    );
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("backoff_delay_0_to_32", |b| {
        b.iter(|| {
            for attempt in 0..32 {
                black_box(policy.delay(black_box(attempt), &mut rng));
            }
        });
    });
}

// ============================================================================
// Benchmark: Offline Send And Flush
// ============================================================================

fn bench_send_and_flush(c: &mut Criterion) {
    let config = ManagerConfig::new().with_heartbeat_enabled(false);

    c.bench_function("send_100_then_flush", |b| {
        b.iter(|| {
            let now = Instant::now();
            let mut machine =
                StateMachine::with_rng(config.clone(), StdRng::seed_from_u64(1), now);

            for _ in 0..100 {
                machine.send(Payload::text("queued"), SendOptions::new(), now);
            }

            let generation = machine
                .connect(now)
                .into_iter()
                .find_map(|action| match action {
                    Action::Open(generation) => Some(generation),
                    _ => None,
                });
            if let Some(generation) = generation {
                black_box(machine.transport_opened(generation, now));
            }
        });
    });
}

// ============================================================================
// Main
// ============================================================================

criterion_group!(
    benches,
    bench_queue_push,
    bench_queue_drain,
    bench_backoff,
    bench_send_and_flush
);
criterion_main!(benches);
