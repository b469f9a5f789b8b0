//! Data models for observations, predictions and stored days
//!
//! This module contains the data structures shared by the normalizer, the
//! predictor and the record store.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::WellbeingError;

/// Which model variant pair served a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    /// Observation only, no memory of yesterday
    A,
    /// Observation plus yesterday's mood and energy
    B,
}

impl Route {
    /// Route for a request, decided only by whether both lags are present
    #[must_use]
    pub const fn for_lags(has_both_lags: bool) -> Self {
        if has_both_lags {
            Self::B
        } else {
            Self::A
        }
    }

    /// Identifier stored alongside a saved day
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = WellbeingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "modeA" => Ok(Self::A),
            "B" | "modeB" => Ok(Self::B),
            other => Err(WellbeingError::validation("route", format!("unknown route {other:?}"))),
        }
    }
}

/// Three-way class predicted for mood and energy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Class 0
    Low,
    /// Class 1
    Medium,
    /// Class 2
    High,
}

impl Level {
    /// Level for a class index, if it is one of 0, 1, 2
    #[must_use]
    pub fn from_class(class: i64) -> Option<Self> {
        match class {
            0 => Some(Self::Low),
            1 => Some(Self::Medium),
            2 => Some(Self::High),
            _ => None,
        }
    }

    /// Class index used by the models
    #[must_use]
    pub const fn class(self) -> u8 {
        self as u8
    }

    /// Level shown on trend charts (1 = Low, 3 = High)
    #[must_use]
    pub const fn chart_level(self) -> u8 {
        self as u8 + 1
    }

    /// Human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Yesterday's levels, only ever present as a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lags {
    /// Yesterday's mood class (0-2)
    pub mood: i64,
    /// Yesterday's energy class (0-2)
    pub energy: i64,
}

/// One normalized day of user input, with every integer already clamped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Raw cycle-phase label, trimmed
    pub phase: String,
    /// 1 on Saturday/Sunday
    pub is_weekend: i64,
    /// Sleep in minutes (0-900)
    pub sleep_duration_minutes: i64,
    /// Resting heart rate in bpm (35-110)
    pub resting_heart_rate: i64,
    /// Stress severity (0-5)
    pub stress_num: i64,
    /// Cramps severity (0-5)
    pub cramps_num: i64,
    /// Headache severity (0-5)
    pub headaches_num: i64,
    /// Sleep-issue severity (0-5)
    pub sleepissue_num: i64,
    /// Yesterday's levels when both were supplied
    pub lags: Option<Lags>,
}

impl Observation {
    /// Route this observation is served by
    #[must_use]
    pub const fn route(&self) -> Route {
        Route::for_lags(self.lags.is_some())
    }
}

/// Output of one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted mood class (0-2)
    pub mood_pred: u8,
    /// Predicted energy class (0-2)
    pub energy_pred: u8,
    /// Variant pair used for both targets
    pub route: Route,
    /// Mood class probabilities, when the model exposes them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_proba: Option<Vec<f64>>,
    /// Energy class probabilities, when the model exposes them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_proba: Option<Vec<f64>>,
}

impl PredictionResult {
    /// Predicted mood as a level
    #[must_use]
    pub fn mood_level(&self) -> Option<Level> {
        Level::from_class(i64::from(self.mood_pred))
    }

    /// Predicted energy as a level
    #[must_use]
    pub fn energy_level(&self) -> Option<Level> {
        Level::from_class(i64::from(self.energy_pred))
    }
}

/// A saved day as read back from the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Calendar date, the record key
    pub entry_date: NaiveDate,
    /// Raw cycle-phase label
    pub phase: String,
    /// 1 on Saturday/Sunday
    pub is_weekend: i64,
    /// Sleep in minutes
    pub sleep_duration_minutes: i64,
    /// Resting heart rate in bpm
    pub resting_heart_rate: i64,
    /// Cramps severity
    pub cramps_num: i64,
    /// Headache severity
    pub headaches_num: i64,
    /// Sleep-issue severity
    pub sleepissue_num: i64,
    /// Stress severity
    pub stress_num: i64,
    /// Yesterday's mood, if supplied
    pub lag1_mood: Option<i64>,
    /// Yesterday's energy, if supplied
    pub lag1_energy: Option<i64>,
    /// Actual mood recorded afterwards
    pub gt_mood: Option<i64>,
    /// Actual energy recorded afterwards
    pub gt_energy: Option<i64>,
    /// Predicted mood class
    pub mood_pred: Option<i64>,
    /// Predicted energy class
    pub energy_pred: Option<i64>,
    /// Route used for the prediction
    pub route: Option<Route>,
    /// Mood class probabilities
    pub mood_proba: Option<Vec<f64>>,
    /// Energy class probabilities
    pub energy_proba: Option<Vec<f64>>,
    /// Insert timestamp assigned by SQLite
    pub created_at: Option<NaiveDateTime>,
}

impl StoredRecord {
    /// Sleep converted to hours
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sleep_hours(&self) -> f64 {
        self.sleep_duration_minutes as f64 / 60.0
    }

    /// Predicted mood as a level
    #[must_use]
    pub fn mood_level(&self) -> Option<Level> {
        self.mood_pred.and_then(Level::from_class)
    }

    /// Predicted energy as a level
    #[must_use]
    pub fn energy_level(&self) -> Option<Level> {
        self.energy_pred.and_then(Level::from_class)
    }

    /// Rebuild the observation part of this record
    #[must_use]
    pub fn observation(&self) -> Observation {
        let lags = match (self.lag1_mood, self.lag1_energy) {
            (Some(mood), Some(energy)) => Some(Lags { mood, energy }),
            _ => None,
        };
        Observation {
            phase: self.phase.clone(),
            is_weekend: self.is_weekend,
            sleep_duration_minutes: self.sleep_duration_minutes,
            resting_heart_rate: self.resting_heart_rate,
            stress_num: self.stress_num,
            cramps_num: self.cramps_num,
            headaches_num: self.headaches_num,
            sleepissue_num: self.sleepissue_num,
            lags,
        }
    }
}

/// True for Saturday and Sunday
#[must_use]
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
