//! Criterion benchmarks for the analysis engine.
//!
//! The collector re-runs the whole engine on every new sample, so these
//! measure a full recomputation over realistic history sizes.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use powerwatch_rs_analysis::{
    analyze_battery_health_at, detect_anomalies, detect_charge_cycles, robust_average_discharge_rate,
};
use powerwatch_rs_core::Measurement;

/// Alternating discharge/charge sessions sampled every 30 seconds.
fn generate_history(count: usize) -> Vec<Measurement> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|index| {
            let session = index / 120;
            let step = (index % 120) as u32;
            let charging = session % 2 == 1;
            let percentage = if charging { 40 + step / 2 } else { 100 - step / 2 };
            let mut m = Measurement::new(
                start + Duration::seconds(30 * index as i64),
                percentage as u8,
                if charging { "charging" } else { "discharging" },
            );
            m.design_capacity = 5200;
            m.full_charge_capacity = 5000 - (index / 50) as u32;
            m.current_capacity = 50 * percentage;
            m.cycle_count = 300 + session as u32;
            m.voltage = 11_400 + (index % 7) as i32 * 10;
            m.amperage = if charging { 2_000 } else { -1_200 };
            m.derive_power();
            m
        })
        .collect()
}

fn bench_health(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_battery_health");
    let now = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

    for size in [50_usize, 200, 1000] {
        let history = generate_history(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &history, |b, history| {
            b.iter(|| analyze_battery_health_at(black_box(history), now));
        });
    }

    group.finish();
}

fn bench_components(c: &mut Criterion) {
    let history = generate_history(500);

    c.bench_function("robust_rate_500", |b| {
        b.iter(|| robust_average_discharge_rate(black_box(&history), 10));
    });
    c.bench_function("anomalies_500", |b| {
        b.iter(|| detect_anomalies(black_box(&history)));
    });
    c.bench_function("cycles_500", |b| {
        b.iter(|| detect_charge_cycles(black_box(&history)));
    });
}

criterion_group!(benches, bench_health, bench_components);
criterion_main!(benches);
