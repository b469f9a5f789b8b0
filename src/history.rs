//! Review of saved days: month calendars, trend series and summaries.
//!
//! Everything here is computed from [`StoredRecord`]s already fetched from the
//! store; nothing touches the database.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::error::{Result, WellbeingError};
use crate::models::{Level, StoredRecord};
use crate::validation::InputValidator;

/// First and last day of a calendar month
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    InputValidator::validate_month(year, month)?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| WellbeingError::InvalidDate(format!("{year}-{month:02} has no first day")))?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| WellbeingError::InvalidDate(format!("{year}-{month:02} has no last day")))?;
    Ok((first, last))
}

/// One calendar day of a month view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCell {
    /// The day
    pub date: NaiveDate,
    /// True when a record exists for the day
    pub logged: bool,
    /// Predicted mood, if any
    pub mood: Option<Level>,
    /// Predicted energy, if any
    pub energy: Option<Level>,
}

/// Every day of the month, marking the ones with a saved record
pub fn month_days(year: i32, month: u32, records: &[StoredRecord]) -> Result<Vec<DayCell>> {
    let (first, last) = month_bounds(year, month)?;
    Ok(first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|date| {
            let record = records.iter().find(|r| r.entry_date == date);
            DayCell {
                date,
                logged: record.is_some(),
                mood: record.and_then(StoredRecord::mood_level),
                energy: record.and_then(StoredRecord::energy_level),
            }
        })
        .collect())
}

/// Per-date series for trend charts, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSeries {
    /// Sleep in hours
    pub sleep_hours: Vec<(NaiveDate, f64)>,
    /// Stress severity
    pub stress: Vec<(NaiveDate, i64)>,
    /// Resting heart rate
    pub resting_heart_rate: Vec<(NaiveDate, i64)>,
    /// Predicted mood on the 1-3 chart scale
    pub mood: Vec<(NaiveDate, u8)>,
    /// Predicted energy on the 1-3 chart scale
    pub energy: Vec<(NaiveDate, u8)>,
}

impl TrendSeries {
    /// Build the series; days without a prediction are left out of mood/energy
    #[must_use]
    pub fn from_records(records: &[StoredRecord]) -> Self {
        let mut sorted: Vec<&StoredRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.entry_date);

        let mut series = Self::default();
        for record in sorted {
            let date = record.entry_date;
            series.sleep_hours.push((date, record.sleep_hours()));
            series.stress.push((date, record.stress_num));
            series.resting_heart_rate.push((date, record.resting_heart_rate));
            if let Some(level) = record.mood_level() {
                series.mood.push((date, level.chart_level()));
            }
            if let Some(level) = record.energy_level() {
                series.energy.push((date, level.chart_level()));
            }
        }
        series
    }

    /// True when there is nothing to chart
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sleep_hours.is_empty()
    }
}

/// How often each level was predicted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    /// Low predictions
    pub low: usize,
    /// Medium predictions
    pub medium: usize,
    /// High predictions
    pub high: usize,
}

impl LevelCounts {
    fn add(&mut self, level: Level) {
        match level {
            Level::Low => self.low += 1,
            Level::Medium => self.medium += 1,
            Level::High => self.high += 1,
        }
    }

    /// Count for one level
    #[must_use]
    pub const fn get(&self, level: Level) -> usize {
        match level {
            Level::Low => self.low,
            Level::Medium => self.medium,
            Level::High => self.high,
        }
    }

    /// Total predictions counted
    #[must_use]
    pub const fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

/// Aggregates for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    /// Year
    pub year: i32,
    /// Month, 1-12
    pub month: u32,
    /// Days with a saved record
    pub days_logged: usize,
    /// Mean sleep in hours
    pub avg_sleep_hours: Option<f64>,
    /// Mean stress severity
    pub avg_stress: Option<f64>,
    /// Mean resting heart rate
    pub avg_resting_heart_rate: Option<f64>,
    /// Predicted mood levels
    pub mood_levels: LevelCounts,
    /// Predicted energy levels
    pub energy_levels: LevelCounts,
    /// Share of labelled days where the mood prediction was right
    pub mood_hit_rate: Option<f64>,
    /// Share of labelled days where the energy prediction was right
    pub energy_hit_rate: Option<f64>,
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[allow(clippy::cast_precision_loss)]
fn hit_rate(pairs: impl Iterator<Item = (Option<i64>, Option<i64>)>) -> Option<f64> {
    let (hits, labelled) = pairs
        .filter_map(|(pred, actual)| Some((pred?, actual?)))
        .fold((0_usize, 0_usize), |(h, n), (p, a)| (h + usize::from(p == a), n + 1));
    (labelled > 0).then(|| hits as f64 / labelled as f64)
}

impl MonthSummary {
    /// Summarize the records falling inside `year`/`month`; others are ignored
    #[allow(clippy::cast_precision_loss)]
    pub fn from_records(year: i32, month: u32, records: &[StoredRecord]) -> Result<Self> {
        InputValidator::validate_month(year, month)?;
        let in_month: Vec<&StoredRecord> = records
            .iter()
            .filter(|r| r.entry_date.year() == year && r.entry_date.month() == month)
            .collect();

        let mut mood_levels = LevelCounts::default();
        let mut energy_levels = LevelCounts::default();
        for record in &in_month {
            if let Some(level) = record.mood_level() {
                mood_levels.add(level);
            }
            if let Some(level) = record.energy_level() {
                energy_levels.add(level);
            }
        }

        Ok(Self {
            year,
            month,
            days_logged: in_month.len(),
            avg_sleep_hours: mean(in_month.iter().map(|r| r.sleep_hours())),
            avg_stress: mean(in_month.iter().map(|r| r.stress_num as f64)),
            avg_resting_heart_rate: mean(in_month.iter().map(|r| r.resting_heart_rate as f64)),
            mood_levels,
            energy_levels,
            mood_hit_rate: hit_rate(in_month.iter().map(|r| (r.mood_pred, r.gt_mood))),
            energy_hit_rate: hit_rate(in_month.iter().map(|r| (r.energy_pred, r.gt_energy))),
        })
    }
}
