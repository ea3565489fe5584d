//! # Parse Benchmarks
//!
//! Performance benchmarks for reqlint-core parsing, linting and export.
//!
//! Run with: `cargo bench -p reqlint-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use reqlint_core::{Linter, Manifest, Snapshot, Version, export_snapshot};
use std::hint::black_box;

/// A manifest with `size` entries split into sections of ten.
fn create_manifest_text(size: usize) -> String {
    let mut text = String::new();
    for i in 0..size {
        if i % 10 == 0 {
            text.push_str(&format!("\n# Section {}\n", i / 10));
        }
        text.push_str(&format!(
            "package-{}[extra]>={}.{}.0,<{}.0  # entry {}\n",
            i,
            i % 7,
            i % 13,
            i % 7 + 1,
            i
        ));
    }
    text
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_version_parse(c: &mut Criterion) {
    c.bench_function("version_parse", |b| {
        b.iter(|| Version::parse(black_box("1!2.10.3rc4.post5.dev6+ubuntu.1")))
    });
}

fn bench_manifest_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest_parse");
    for size in [10, 100, 1000] {
        let text = create_manifest_text(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| Manifest::parse(black_box(text)))
        });
    }
    group.finish();
}

fn bench_lint(c: &mut Criterion) {
    let mut group = c.benchmark_group("lint");
    let linter = Linter::default();
    for size in [10, 100, 1000] {
        let manifest = Manifest::parse(&create_manifest_text(size)).expect("parse");
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &manifest,
            |b, manifest| b.iter(|| linter.lint(black_box(manifest))),
        );
    }
    group.finish();
}

fn bench_export_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_snapshot");
    for size in [100, 1000] {
        let manifest = Manifest::parse(&create_manifest_text(size)).expect("parse");
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &manifest,
            |b, manifest| b.iter(|| export_snapshot(&Snapshot::from_manifest(black_box(manifest)))),
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_version_parse,
    bench_manifest_parse,
    bench_lint,
    bench_export_snapshot,
);

criterion_main!(benches);
