//! Benchmarks for the trip indexes
//!
//! Run with: cargo bench

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;
use triplog::{store, CalendarIndex, DayIndex, Location, Trip, TripIndex, TripStore};

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 6, 0, 0).unwrap()
}

/// Three trips a day, oldest first
fn create_test_trips(count: usize) -> Vec<Trip> {
    let home = Location::new(37.7749, -122.4194);
    let work = Location::new(37.8044, -122.2712);
    (0..count)
        .map(|i| {
            let start = origin() + Duration::hours(8 * i as i64);
            Trip::new(home, start, work, start + Duration::minutes(25), 13_400.0).unwrap()
        })
        .collect()
}

/// Same trips in a scrambled but deterministic order
fn scrambled(mut trips: Vec<Trip>) -> Vec<Trip> {
    let len = trips.len();
    for i in 0..len {
        trips.swap(i, (i * 7919 + 13) % len);
    }
    trips
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [100, 1000, 10000] {
        let trips = scrambled(create_test_trips(size));
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("flat", size), &trips, |b, trips| {
            b.iter(|| DayIndex::from_trips(black_box(trips.clone()), utc()))
        });

        group.bench_with_input(BenchmarkId::new("calendar", size), &trips, |b, trips| {
            b.iter(|| CalendarIndex::from_trips(black_box(trips.clone()), utc()))
        });
    }

    group.finish();
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_in_order");

    for size in [1000, 10000] {
        let trips = create_test_trips(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("flat", size), &trips, |b, trips| {
            b.iter(|| {
                let mut index = DayIndex::with_offset(utc());
                for trip in trips.iter().cloned() {
                    index.add(trip);
                }
                index
            })
        });

        group.bench_with_input(BenchmarkId::new("calendar", size), &trips, |b, trips| {
            b.iter(|| {
                let mut index = CalendarIndex::with_offset(utc());
                for trip in trips.iter().cloned() {
                    index.add(trip);
                }
                index
            })
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    let trips = create_test_trips(10000);
    let flat = DayIndex::from_trips(trips.clone(), utc());
    let calendar = CalendarIndex::from_trips(trips, utc());
    let at = origin() + Duration::days(1500);

    group.bench_function("flat_row_and_section", |b| {
        b.iter(|| flat.row_and_section_for(black_box(at)))
    });
    group.bench_function("calendar_row_and_section", |b| {
        b.iter(|| calendar.row_and_section_for(black_box(at)))
    });

    let mid = flat.section_count() / 2;
    group.bench_function("flat_section", |b| b.iter(|| flat.section(black_box(mid))));
    group.bench_function("calendar_section", |b| {
        b.iter(|| calendar.section(black_box(mid)))
    });

    group.finish();
}

fn bench_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("range");
    let trips = create_test_trips(10000);
    let flat = DayIndex::from_trips(trips.clone(), utc());
    let calendar = CalendarIndex::from_trips(trips, utc());

    let start = origin() + Duration::days(1000);
    let end = start + Duration::days(30);
    group.throughput(Throughput::Elements(90));

    group.bench_function("flat_30_days", |b| {
        b.iter(|| flat.range(black_box(start), black_box(end)).count())
    });
    group.bench_function("calendar_30_days", |b| {
        b.iter(|| calendar.range(black_box(start), black_box(end)).count())
    });

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    let index = DayIndex::from_trips(create_test_trips(1000), utc());

    group.bench_function("encode_1000", |b| b.iter(|| store::encode(black_box(&index)).unwrap()));

    let encoded = store::encode(&index).unwrap();
    group.bench_function("decode_1000", |b| b.iter(|| store::decode(black_box(&encoded)).unwrap()));

    group.bench_function("save_1000", |b| {
        let dir = tempdir().unwrap();
        let trip_store = TripStore::new(dir.path().join("trips.json"));
        b.iter(|| trip_store.save(black_box(&index)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_add, bench_lookup, bench_range, bench_store);
criterion_main!(benches);
