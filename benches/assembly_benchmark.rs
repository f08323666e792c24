use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use kmer_walk::{assemble, assemble_genome, KmerGraph, SimulatedReadSource, WalkConfig};

/// Random genome plus seeded reads sampled from it
fn generate_synthetic_reads(genome_len: usize, read_len: usize, coverage: f64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(42);
    let bases = ['A', 'C', 'G', 'T'];
    let genome: String = (0..genome_len).map(|_| bases[rng.gen_range(0..4)]).collect();
    SimulatedReadSource::new(&genome, read_len, coverage, 42).into_reads()
}

fn bench_graph_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_construction");

    for genome_len in [1_000, 5_000, 20_000] {
        let reads = generate_synthetic_reads(genome_len, 150, 20.0);
        group.bench_with_input(
            BenchmarkId::new("build_graph", genome_len),
            &reads,
            |b, reads| {
                b.iter(|| KmerGraph::build(black_box(reads.as_slice()), 31));
            },
        );
    }

    group.finish();
}

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("traversal");

    for genome_len in [1_000, 5_000, 20_000] {
        let reads = generate_synthetic_reads(genome_len, 150, 20.0);
        let graph = KmerGraph::build(reads.as_slice(), 31).expect("valid k");
        group.bench_with_input(
            BenchmarkId::new("walk_contigs", genome_len),
            &graph,
            |b, graph| {
                b.iter(|| assemble(black_box(graph), WalkConfig::default()).count());
            },
        );
    }

    group.finish();
}

fn bench_repetitive_genome(c: &mut Criterion) {
    let mut group = c.benchmark_group("repetitive_genome");
    group.measurement_time(Duration::from_secs(10));

    // Tandem repeats collapse into short cycles that the cycle guard must cut.
    for motif in ["ATGCGT", "GCCGGC", "ATATAT"] {
        let genome = motif.repeat(1_000);
        let reads = SimulatedReadSource::new(&genome, 150, 20.0, 42).into_reads();
        group.bench_with_input(BenchmarkId::new("assemble", motif), &reads, |b, reads| {
            b.iter(|| assemble_genome(black_box(reads.as_slice()), 31, None));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_graph_construction,
    bench_traversal,
    bench_repetitive_genome
);
criterion_main!(benches);
