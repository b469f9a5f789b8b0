//! Feature normalization.
//!
//! Turns a loosely typed JSON payload into a clamped [`Observation`], builds the
//! canonical [`FeatureRow`] from it, and aligns that row to the column list a
//! particular model was trained on.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, WellbeingError};
use crate::models::{Lags, Observation};

/// Raw request body: field name to loosely typed value
pub type Payload = Map<String, Value>;

/// Inclusive bounds for sleep duration in minutes
pub const SLEEP_MINUTES_RANGE: (i64, i64) = (0, 900);
/// Inclusive bounds for resting heart rate in bpm
pub const RESTING_HR_RANGE: (i64, i64) = (35, 110);
/// Inclusive bounds for the 0-5 severity ordinals
pub const ORDINAL_RANGE: (i64, i64) = (0, 5);
/// Inclusive bounds for mood/energy classes
pub const CLASS_RANGE: (i64, i64) = (0, 2);
/// Inclusive bounds for the weekend flag
pub const FLAG_RANGE: (i64, i64) = (0, 1);

/// Phase labels offered to people logging a day
pub const PHASE_VALUES: [&str; 4] = ["Menstruation", "Late Follicular", "Ovulation", "Luteal"];

/// One-hot column set when the phase label is not recognized
pub const PHASE_NAN: &str = "phase_nan";

/// Every one-hot phase column, in canonical order
pub const PHASE_COLUMNS: [&str; 5] = [
    "phase_Fertility",
    "phase_Follicular",
    "phase_Luteal",
    "phase_Menstrual",
    PHASE_NAN,
];

/// Payload and feature-row field names
pub mod fields {
    /// Cycle-phase label
    pub const PHASE: &str = "phase";
    /// Weekend flag
    pub const IS_WEEKEND: &str = "is_weekend";
    /// Sleep duration
    pub const SLEEP_DURATION_MINUTES: &str = "sleep_duration_minutes";
    /// Resting heart rate
    pub const RESTING_HEART_RATE: &str = "resting_heart_rate";
    /// Older payloads spell the heart-rate field this way
    pub const RESTING_HEART_RATE_LEGACY: &str = "resting_heart_rate__value";
    /// Cramps severity
    pub const CRAMPS_NUM: &str = "cramps_num";
    /// Headache severity
    pub const HEADACHES_NUM: &str = "headaches_num";
    /// Sleep-issue severity
    pub const SLEEPISSUE_NUM: &str = "sleepissue_num";
    /// Stress severity
    pub const STRESS_NUM: &str = "stress_num";
    /// Yesterday's mood
    pub const LAG1_MOOD: &str = "lag1_mood";
    /// Yesterday's energy
    pub const LAG1_ENERGY: &str = "lag1_energy";
}

/// Coarse phase category used for one-hot encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseBucket {
    /// Menstruation
    Menstrual,
    /// Follicular phase
    Follicular,
    /// Around ovulation
    Fertility,
    /// Luteal phase
    Luteal,
}

impl PhaseBucket {
    /// Map a raw phase label onto its bucket
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Menstruation" | "Menstrual" | "Menses" => Some(Self::Menstrual),
            "Late Follicular" | "Follicular" => Some(Self::Follicular),
            "Ovulation" | "Fertility" => Some(Self::Fertility),
            "Luteal" => Some(Self::Luteal),
            _ => None,
        }
    }

    /// One-hot column for this bucket
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Menstrual => "phase_Menstrual",
            Self::Follicular => "phase_Follicular",
            Self::Fertility => "phase_Fertility",
            Self::Luteal => "phase_Luteal",
        }
    }
}

/// Saturate `value` into the inclusive `bounds`.
#[must_use]
pub fn clamp(value: i64, bounds: (i64, i64)) -> i64 {
    value.clamp(bounds.0, bounds.1)
}

/// Ranges and values callers use to constrain input collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputSchema {
    /// Phase labels to offer
    pub phase_values: Vec<&'static str>,
    /// Sleep duration bounds in minutes
    pub sleep_minutes_range: [i64; 2],
    /// Resting heart rate bounds in bpm
    pub resting_hr_range: [i64; 2],
    /// Severity ordinal bounds
    pub ordinal_range: [i64; 2],
    /// Valid mood/energy classes
    pub cls3_values: Vec<i64>,
}

/// Describe the accepted input.
#[must_use]
pub fn input_schema() -> InputSchema {
    InputSchema {
        phase_values: PHASE_VALUES.to_vec(),
        sleep_minutes_range: [SLEEP_MINUTES_RANGE.0, SLEEP_MINUTES_RANGE.1],
        resting_hr_range: [RESTING_HR_RANGE.0, RESTING_HR_RANGE.1],
        ordinal_range: [ORDINAL_RANGE.0, ORDINAL_RANGE.1],
        cls3_values: (CLASS_RANGE.0..=CLASS_RANGE.1).collect(),
    }
}

/// Value of `name`, treating JSON null like a missing key
fn present<'a>(payload: &'a Payload, name: &str) -> Option<&'a Value> {
    payload.get(name).filter(|v| !v.is_null())
}

#[allow(clippy::cast_possible_truncation)]
fn as_int(value: &Value, field: &str) -> Result<i64> {
    let invalid = || WellbeingError::validation(field, format!("must be int-like, got {value}"));
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if n.as_u64().is_some() {
                Ok(i64::MAX)
            } else {
                // saturating cast, truncates toward zero
                match n.as_f64() {
                    Some(f) if f.is_finite() => Ok(f as i64),
                    _ => Err(invalid()),
                }
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(invalid()),
    }
}

fn required_int(payload: &Payload, name: &str) -> Result<i64> {
    let value = present(payload, name)
        .ok_or_else(|| WellbeingError::validation(name, "missing required field"))?;
    as_int(value, name)
}

fn optional_int(payload: &Payload, name: &str) -> Result<i64> {
    present(payload, name).map_or(Ok(0), |value| as_int(value, name))
}

fn required_phase(payload: &Payload) -> Result<String> {
    let value = present(payload, fields::PHASE)
        .ok_or_else(|| WellbeingError::validation(fields::PHASE, "missing required field"))?;
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(WellbeingError::validation(
            fields::PHASE,
            format!("must be a label, got {value}"),
        )),
    }
}

fn resting_heart_rate(payload: &Payload) -> Result<i64> {
    match present(payload, fields::RESTING_HEART_RATE) {
        Some(value) => as_int(value, fields::RESTING_HEART_RATE),
        None => present(payload, fields::RESTING_HEART_RATE_LEGACY)
            .ok_or_else(|| WellbeingError::validation(fields::RESTING_HEART_RATE, "missing required field"))
            .and_then(|value| as_int(value, fields::RESTING_HEART_RATE)),
    }
}

/// Validate, coerce and clamp a raw payload.
///
/// Required fields are checked in a fixed order (`phase`, `is_weekend`,
/// `sleep_duration_minutes`, `resting_heart_rate`) so the first offending one
/// is reported. Lags survive only as a pair; a lone lag is dropped unchecked.
pub fn normalize(payload: &Payload) -> Result<Observation> {
    let phase = required_phase(payload)?;
    let is_weekend = clamp(required_int(payload, fields::IS_WEEKEND)?, FLAG_RANGE);
    let sleep_duration_minutes = clamp(
        required_int(payload, fields::SLEEP_DURATION_MINUTES)?,
        SLEEP_MINUTES_RANGE,
    );
    let resting_heart_rate = clamp(resting_heart_rate(payload)?, RESTING_HR_RANGE);

    let cramps_num = clamp(optional_int(payload, fields::CRAMPS_NUM)?, ORDINAL_RANGE);
    let headaches_num = clamp(optional_int(payload, fields::HEADACHES_NUM)?, ORDINAL_RANGE);
    let sleepissue_num = clamp(optional_int(payload, fields::SLEEPISSUE_NUM)?, ORDINAL_RANGE);
    let stress_num = clamp(optional_int(payload, fields::STRESS_NUM)?, ORDINAL_RANGE);

    let lags = match (
        present(payload, fields::LAG1_MOOD),
        present(payload, fields::LAG1_ENERGY),
    ) {
        (Some(mood), Some(energy)) => Some(Lags {
            mood: clamp(as_int(mood, fields::LAG1_MOOD)?, CLASS_RANGE),
            energy: clamp(as_int(energy, fields::LAG1_ENERGY)?, CLASS_RANGE),
        }),
        (Some(_), None) | (None, Some(_)) => {
            debug!("Dropping one-sided lag input");
            None
        }
        (None, None) => None,
    };

    Ok(Observation {
        phase,
        is_weekend,
        sleep_duration_minutes,
        resting_heart_rate,
        stress_num,
        cramps_num,
        headaches_num,
        sleepissue_num,
        lags,
    })
}

/// Canonical model-ready row built from one observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRow {
    values: IndexMap<&'static str, i64>,
}

impl FeatureRow {
    /// Build the row deterministically from an observation.
    #[must_use]
    pub fn from_observation(obs: &Observation) -> Self {
        let mut values = IndexMap::with_capacity(16);
        values.insert(fields::IS_WEEKEND, obs.is_weekend);
        values.insert(fields::SLEEP_DURATION_MINUTES, obs.sleep_duration_minutes);
        values.insert(fields::RESTING_HEART_RATE, obs.resting_heart_rate);
        values.insert(fields::CRAMPS_NUM, obs.cramps_num);
        values.insert(fields::HEADACHES_NUM, obs.headaches_num);
        values.insert(fields::SLEEPISSUE_NUM, obs.sleepissue_num);
        values.insert(fields::STRESS_NUM, obs.stress_num);

        if let Some(lags) = obs.lags {
            values.insert(fields::LAG1_MOOD, lags.mood);
            values.insert(fields::LAG1_ENERGY, lags.energy);
        }

        for column in PHASE_COLUMNS {
            values.insert(column, 0);
        }
        let hot = PhaseBucket::from_label(&obs.phase).map_or(PHASE_NAN, PhaseBucket::column);
        values.insert(hot, 1);

        Self { values }
    }

    /// Value of a column, if the row carries it.
    ///
    /// `resting_heart_rate__value` reads the heart-rate column, so models
    /// trained on the older column name still receive it.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<i64> {
        let column = if column == fields::RESTING_HEART_RATE_LEGACY {
            fields::RESTING_HEART_RATE
        } else {
            column
        };
        self.values.get(column).copied()
    }

    /// Column names in canonical order
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.keys().copied()
    }

    /// (column, value) pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    /// Number of columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for rows built from an observation
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reorder to exactly `expected`: unknown columns are dropped, missing ones are 0.
    ///
    /// Column names resolve as in [`FeatureRow::get`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn align(&self, expected: &[String]) -> AlignedFeatures {
        let values = expected
            .iter()
            .map(|column| self.get(column).unwrap_or(0) as f64)
            .collect();
        AlignedFeatures {
            columns: expected.to_vec(),
            values,
        }
    }
}

/// Single-row matrix whose columns match one model's expected schema
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFeatures {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl AlignedFeatures {
    /// Build directly from parallel column/value vectors
    ///
    /// Returns `None` if the lengths differ.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<f64>) -> Option<Self> {
        (columns.len() == values.len()).then_some(Self { columns, values })
    }

    /// Column names in model order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The single row of values, in column order
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named column
    #[must_use]
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }

    /// Number of columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the model expects no columns at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
