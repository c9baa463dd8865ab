use criterion::{Criterion, criterion_group, criterion_main};
use marble_core::parser::parse_marbles;
use marble_core::recorded::MAX_TIME;
use marble_core::scheduler::VirtualScheduler;

fn bench_notation_parsing(c: &mut Criterion) {
    let diagram = "--a-b--(cd)---e--".repeat(50) + "|";
    c.bench_function("parse_long_diagram", |b| {
        b.iter(|| parse_marbles(&diagram, 10).unwrap());
    });
}

fn bench_scheduler_drain(c: &mut Criterion) {
    c.bench_function("drain_10k_callbacks", |b| {
        b.iter(|| {
            let scheduler = VirtualScheduler::new();
            for delay in 0..10_000i64 {
                scheduler.schedule(delay, || {});
            }
            scheduler.advance_to(MAX_TIME);
        });
    });
}

criterion_group!(benches, bench_notation_parsing, bench_scheduler_drain);
criterion_main!(benches);
