//! Property tests for payload normalization and feature rows

use proptest::prelude::*;
use serde_json::{json, Value};
use wellbeing_explorer::features::{
    fields, normalize, FeatureRow, Payload, PHASE_COLUMNS, PHASE_NAN, PHASE_VALUES,
};
use wellbeing_explorer::models::{Observation, Route};

fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("test payloads are objects"),
    }
}

fn base_payload(phase: &str) -> Payload {
    payload(json!({
        "phase": phase,
        "is_weekend": 0,
        "sleep_duration_minutes": 420,
        "resting_heart_rate": 62
    }))
}

fn to_payload(obs: &Observation) -> Payload {
    let mut p = payload(json!({
        "phase": obs.phase,
        "is_weekend": obs.is_weekend,
        "sleep_duration_minutes": obs.sleep_duration_minutes,
        "resting_heart_rate": obs.resting_heart_rate,
        "stress_num": obs.stress_num,
        "cramps_num": obs.cramps_num,
        "headaches_num": obs.headaches_num,
        "sleepissue_num": obs.sleepissue_num
    }));
    if let Some(lags) = obs.lags {
        p.insert(fields::LAG1_MOOD.into(), Value::from(lags.mood));
        p.insert(fields::LAG1_ENERGY.into(), Value::from(lags.energy));
    }
    p
}

fn phase_label() -> impl Strategy<Value = String> {
    prop_oneof![
        proptest::sample::select(PHASE_VALUES.to_vec()).prop_map(str::to_string),
        "[A-Za-z ]{0,16}",
    ]
}

proptest! {
    #[test]
    fn clamped_values_stay_in_range(
        weekend in -5i64..5,
        sleep in -5_000i64..5_000,
        hr in -500i64..500,
        stress in -50i64..50,
        cramps in -50i64..50,
        headaches in -50i64..50,
        sleepissue in -50i64..50,
    ) {
        let obs = normalize(&payload(json!({
            "phase": "Luteal",
            "is_weekend": weekend,
            "sleep_duration_minutes": sleep,
            "resting_heart_rate": hr,
            "stress_num": stress,
            "cramps_num": cramps,
            "headaches_num": headaches,
            "sleepissue_num": sleepissue
        }))).unwrap();

        prop_assert!((0..=1).contains(&obs.is_weekend));
        prop_assert!((0..=900).contains(&obs.sleep_duration_minutes));
        prop_assert!((35..=110).contains(&obs.resting_heart_rate));
        for ordinal in [obs.stress_num, obs.cramps_num, obs.headaches_num, obs.sleepissue_num] {
            prop_assert!((0..=5).contains(&ordinal));
        }
        if (0..=900).contains(&sleep) {
            prop_assert_eq!(obs.sleep_duration_minutes, sleep);
        }
    }

    #[test]
    fn normalize_is_idempotent(
        phase in phase_label(),
        sleep in -2_000i64..2_000,
        hr in 0i64..300,
        stress in -10i64..10,
        lags in proptest::option::of((-3i64..6, -3i64..6)),
    ) {
        let mut p = base_payload(&phase);
        p.insert(fields::SLEEP_DURATION_MINUTES.into(), Value::from(sleep));
        p.insert(fields::RESTING_HEART_RATE.into(), Value::from(hr));
        p.insert(fields::STRESS_NUM.into(), Value::from(stress));
        if let Some((mood, energy)) = lags {
            p.insert(fields::LAG1_MOOD.into(), Value::from(mood));
            p.insert(fields::LAG1_ENERGY.into(), Value::from(energy));
        }

        let once = normalize(&p).unwrap();
        let twice = normalize(&to_payload(&once)).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(FeatureRow::from_observation(&once), FeatureRow::from_observation(&twice));
    }

    #[test]
    fn exactly_one_phase_column_is_hot(phase in phase_label()) {
        let row = FeatureRow::from_observation(&normalize(&base_payload(&phase)).unwrap());
        let hot: Vec<&str> = PHASE_COLUMNS
            .iter()
            .copied()
            .filter(|c| row.get(c) == Some(1))
            .collect();
        prop_assert_eq!(hot.len(), 1);
        for column in PHASE_COLUMNS {
            prop_assert!(row.get(column).is_some());
        }
    }

    #[test]
    fn lags_survive_only_as_a_pair(
        mood in proptest::option::of(-3i64..6),
        energy in proptest::option::of(-3i64..6),
    ) {
        let mut p = base_payload("Luteal");
        if let Some(mood) = mood {
            p.insert(fields::LAG1_MOOD.into(), Value::from(mood));
        }
        if let Some(energy) = energy {
            p.insert(fields::LAG1_ENERGY.into(), Value::from(energy));
        }

        let obs = normalize(&p).unwrap();
        let row = FeatureRow::from_observation(&obs);
        let both = mood.is_some() && energy.is_some();

        prop_assert_eq!(obs.lags.is_some(), both);
        prop_assert_eq!(row.get(fields::LAG1_MOOD).is_some(), both);
        prop_assert_eq!(row.get(fields::LAG1_ENERGY).is_some(), both);
        prop_assert_eq!(obs.route(), if both { Route::B } else { Route::A });
        if let Some(lags) = obs.lags {
            prop_assert!((0..=2).contains(&lags.mood));
            prop_assert!((0..=2).contains(&lags.energy));
        }
    }
}

#[test]
fn test_unknown_phase_sets_nan_column() {
    let row = FeatureRow::from_observation(&normalize(&base_payload("Unknown")).unwrap());
    assert_eq!(row.get(PHASE_NAN), Some(1));
    assert_eq!(row.get("phase_Luteal"), Some(0));
}

#[test]
fn test_phase_bucket_mapping() {
    let cases = [
        ("Menstruation", "phase_Menstrual"),
        ("Late Follicular", "phase_Follicular"),
        ("Ovulation", "phase_Fertility"),
        ("Luteal", "phase_Luteal"),
    ];
    for (label, column) in cases {
        let row = FeatureRow::from_observation(&normalize(&base_payload(label)).unwrap());
        assert_eq!(row.get(column), Some(1), "{label}");
    }
}

#[test]
fn test_canonical_column_order() {
    let mut p = base_payload("Luteal");
    p.insert(fields::LAG1_MOOD.into(), json!(1));
    p.insert(fields::LAG1_ENERGY.into(), json!(2));
    let row = FeatureRow::from_observation(&normalize(&p).unwrap());
    let columns: Vec<&str> = row.columns().collect();
    assert_eq!(
        columns,
        vec![
            "is_weekend",
            "sleep_duration_minutes",
            "resting_heart_rate",
            "cramps_num",
            "headaches_num",
            "sleepissue_num",
            "stress_num",
            "lag1_mood",
            "lag1_energy",
            "phase_Fertility",
            "phase_Follicular",
            "phase_Luteal",
            "phase_Menstrual",
            "phase_nan",
        ]
    );
}

#[test]
fn test_out_of_range_ovulation_day() {
    let obs = normalize(&payload(json!({
        "phase": "Ovulation",
        "is_weekend": 0,
        "sleep_duration_minutes": 999,
        "resting_heart_rate": 10,
        "stress_num": 7
    })))
    .unwrap();
    assert_eq!(obs.sleep_duration_minutes, 900);
    assert_eq!(obs.resting_heart_rate, 35);
    assert_eq!(obs.stress_num, 5);
    assert_eq!(obs.route(), Route::A);
    assert_eq!(FeatureRow::from_observation(&obs).get("phase_Fertility"), Some(1));
}
