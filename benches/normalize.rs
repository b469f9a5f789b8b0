//! Benchmarks for payload normalization and feature alignment.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use wellbeing_explorer::features::{normalize, FeatureRow, Payload};

fn payload(lags: bool) -> Payload {
    let mut value = json!({
        "phase": "Late Follicular",
        "is_weekend": "1",
        "sleep_duration_minutes": 455.5,
        "resting_heart_rate": 61,
        "stress_num": 3,
        "cramps_num": 1,
        "headaches_num": null
    });
    if lags {
        value["lag1_mood"] = json!(2);
        value["lag1_energy"] = json!(1);
    }
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for (label, lags) in [("route_a", false), ("route_b", true)] {
        let p = payload(lags);
        group.bench_with_input(BenchmarkId::new("payload", label), &p, |b, p| {
            b.iter(|| normalize(black_box(p)));
        });
    }
    group.finish();
}

fn bench_feature_row(c: &mut Criterion) {
    let obs = normalize(&payload(true)).unwrap_or_else(|e| panic!("benchmark payload is valid: {e}"));
    let expected: Vec<String> = [
        "phase_Fertility",
        "phase_Follicular",
        "phase_Luteal",
        "phase_Menstrual",
        "phase_nan",
        "sleep_duration_minutes",
        "resting_heart_rate",
        "stress_num",
        "lag1_mood",
        "lag1_energy",
        "hrv_rmssd",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();

    c.bench_function("feature_row", |b| {
        b.iter(|| FeatureRow::from_observation(black_box(&obs)));
    });

    let row = FeatureRow::from_observation(&obs);
    c.bench_function("align", |b| b.iter(|| row.align(black_box(&expected))));
}

criterion_group!(benches, bench_normalize, bench_feature_row);
criterion_main!(benches);
