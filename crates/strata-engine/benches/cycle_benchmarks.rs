//! Benchmarks for dirty-set expansion and batching.
//!
//! Run with: cargo bench -p strata-engine

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use strata_engine::graph::{expand, topological_batches, DirtySet};
use strata_engine::Registry;
use strata_traits::ids::{InstrumentId, Version};
use strata_traits::instrument::{Instrument, InstrumentKind};

// =============================================================================
// TEST DATA GENERATORS
// =============================================================================

/// `quotes` leaves, one index per 10 quotes, one composite per 5 indices.
fn create_registry(quotes: usize) -> Registry {
    let mut instruments = Vec::new();

    for q in 0..quotes {
        instruments.push(Instrument::new(format!("Q{:05}", q), InstrumentKind::Equity));
    }

    let indices = quotes / 10;
    for i in 0..indices {
        let inputs: Vec<String> = (i * 10..(i + 1) * 10).map(|q| format!("Q{:05}", q)).collect();
        instruments.push(
            Instrument::new(format!("IDX{:04}", i), InstrumentKind::Index).with_inputs(inputs),
        );
    }

    for c in 0..indices / 5 {
        let inputs: Vec<String> = (c * 5..(c + 1) * 5).map(|i| format!("IDX{:04}", i)).collect();
        instruments.push(
            Instrument::new(format!("CMP{:03}", c), InstrumentKind::Index).with_inputs(inputs),
        );
    }

    let registry = Registry::new();
    registry
        .register_all(instruments)
        .expect("benchmark graph is acyclic");
    registry
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand");

    for quotes in [100usize, 1_000, 10_000] {
        let registry = create_registry(quotes);
        let snapshot = registry.snapshot();
        let roots: Vec<InstrumentId> = (0..quotes)
            .step_by(7)
            .map(|q| InstrumentId::new(format!("Q{:05}", q)))
            .collect();

        group.throughput(Throughput::Elements(roots.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(quotes), &roots, |b, roots| {
            b.iter(|| expand(black_box(&snapshot), black_box(roots)))
        });
    }

    group.finish();
}

fn bench_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("topological_batches");

    for quotes in [100usize, 1_000, 10_000] {
        let registry = create_registry(quotes);
        let snapshot = registry.snapshot();
        let all = snapshot.ids();
        let closure = expand(&snapshot, &all);

        group.throughput(Throughput::Elements(closure.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(quotes), &closure, |b, closure| {
            b.iter(|| topological_batches(black_box(&snapshot), black_box(closure)))
        });
    }

    group.finish();
}

fn bench_dirty_marks(c: &mut Criterion) {
    let ids: Vec<InstrumentId> = (0..1_000)
        .map(|q| InstrumentId::new(format!("Q{:05}", q)))
        .collect();

    c.bench_function("dirty_set_mark_and_drain_1000", |b| {
        b.iter(|| {
            let dirty = DirtySet::new();
            for (i, id) in ids.iter().enumerate() {
                dirty.mark_dirty(id.clone(), Version::new(i as u64));
                dirty.mark_dirty(id.clone(), Version::new(i as u64 + 1));
            }
            black_box(dirty.drain())
        })
    });
}

criterion_group!(benches, bench_expand, bench_batches, bench_dirty_marks);
criterion_main!(benches);
