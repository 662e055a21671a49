//! Criterion benchmarks for the retrieval hot paths.
//!
//! Benchmarks:
//! 1. Parquet decode of a single source payload
//! 2. Merging N same-shaped sources (index reconcile, rename, inner join)
//! 3. Temporal subsetting of a merged frame

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;

use queryset_core::data::{merge, subset, DateRange, IndexedFrame};
use queryset_core::domain::TemporalUnit;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_frame(column: &str, months: i64, units: i64) -> IndexedFrame {
    let rows = (months * units) as usize;
    let mut time = Vec::with_capacity(rows);
    let mut unit = Vec::with_capacity(rows);
    let mut values = Vec::with_capacity(rows);
    for t in 1..=months {
        for u in 1..=units {
            time.push(t);
            unit.push(u);
            values.push((t * u) as f64 * 0.5);
        }
    }
    let df = DataFrame::new(vec![
        Column::new(column.into(), values),
        Column::new("month_id".into(), time),
        Column::new("country_id".into(), unit),
    ])
    .unwrap();
    IndexedFrame::new(df, "month_id", "country_id").unwrap()
}

// ── 1. Decode ────────────────────────────────────────────────────────

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for &months in &[120i64, 480] {
        let bytes = make_frame("ged", months, 200).to_parquet_bytes().unwrap();
        group.bench_with_input(BenchmarkId::new("200_units", months), &bytes, |b, bytes| {
            b.iter(|| IndexedFrame::from_parquet_bytes(black_box(bytes)).unwrap());
        });
    }

    group.finish();
}

// ── 2. Merge ─────────────────────────────────────────────────────────

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for &sources in &[2usize, 8, 32] {
        // Same column name everywhere so every source gets renamed.
        let frames: Vec<IndexedFrame> = (0..sources).map(|_| make_frame("ged", 240, 200)).collect();
        group.bench_with_input(BenchmarkId::new("sources", sources), &frames, |b, frames| {
            b.iter(|| merge(black_box(frames.clone())).unwrap());
        });
    }

    group.finish();
}

// ── 3. Subset ────────────────────────────────────────────────────────

fn bench_subset(c: &mut Criterion) {
    let mut group = c.benchmark_group("subset");
    let frame = make_frame("ged", 480, 200);
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(1990, 1, 1),
        NaiveDate::from_ymd_opt(1999, 12, 31),
    );

    group.bench_function("month_decade", |b| {
        b.iter(|| subset(black_box(frame.clone()), &range, TemporalUnit::Month).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_merge, bench_subset);
criterion_main!(benches);
