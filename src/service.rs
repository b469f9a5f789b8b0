use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;

use crate::cache::ModelCache;
use crate::config::AppConfig;
use crate::error::Result;
use crate::export::{write_records_to_file, write_records_to_timestamped_dir, ExportFormat};
use crate::features::{fields, Payload, PHASE_VALUES};
use crate::history::{month_bounds, month_days, DayCell, MonthSummary, TrendSeries};
use crate::models::{is_weekend, Level, PredictionResult, StoredRecord};
use crate::predictor::Predictor;
use crate::registry::{FileModelRegistry, ModelSource};
use crate::store::{RecordStore, RecordUpdate};
use crate::validation::InputValidator;

/// Sleep shown for a day nobody has logged yet, in minutes
pub const DEFAULT_SLEEP_MINUTES: i64 = 420;
/// Resting heart rate shown for a day nobody has logged yet
pub const DEFAULT_RESTING_HEART_RATE: i64 = 62;
/// Stress shown for a day nobody has logged yet
pub const DEFAULT_STRESS: i64 = 2;

/// Predictor and record store behind one front door
pub struct WellbeingService {
    predictor: Predictor,
    store: RecordStore,
}

impl WellbeingService {
    /// Service over an already built predictor and store
    pub const fn new(predictor: Predictor, store: RecordStore) -> Self {
        Self { predictor, store }
    }

    /// Wire up the file registry, model cache and store described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source: Arc<dyn ModelSource> = Arc::new(FileModelRegistry::new(
            &config.models.registry_dir,
            config.models.version,
        ));
        let cache = Arc::new(ModelCache::new(config.models.cache_capacity));
        let predictor = Predictor::new(cache, source, config.models.names());
        let store = RecordStore::open(
            &config.database.path,
            config.database.max_connections,
            config.busy_timeout(),
        )?;
        Ok(Self::new(predictor, store))
    }

    /// Underlying store
    #[must_use]
    pub const fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Predict without saving anything
    pub fn predict(&self, payload: &Payload) -> Result<PredictionResult> {
        self.predictor.predict(payload)
    }

    /// Predict for `entry_date` and save the day, replacing any earlier save.
    ///
    /// The weekend flag is always taken from the date.
    pub fn log_day(&self, entry_date: NaiveDate, payload: &Payload) -> Result<PredictionResult> {
        let mut payload = payload.clone();
        payload.insert(
            fields::IS_WEEKEND.to_string(),
            Value::from(i64::from(is_weekend(entry_date))),
        );

        let prepared = self.predictor.prepare(&payload)?;
        let prediction = self.predictor.predict_prepared(&prepared)?;
        self.store.upsert(&RecordUpdate::from_prediction(
            entry_date,
            &prepared.observation,
            &prediction,
        )?)?;
        info!(%entry_date, route = %prediction.route, "Logged day");
        Ok(prediction)
    }

    /// Starting values for logging `entry_date`: the saved day if there is one,
    /// otherwise the defaults.
    ///
    /// Yesterday's levels are never carried over; a re-log uses route "A"
    /// unless the caller supplies both lags again.
    pub fn prefill(&self, entry_date: NaiveDate) -> Result<Payload> {
        let mut payload = Payload::new();
        let weekend = i64::from(is_weekend(entry_date));

        match self.store.fetch_one(entry_date)? {
            Some(saved) => {
                let obs = saved.observation();
                payload.insert(fields::PHASE.into(), Value::from(obs.phase));
                payload.insert(fields::SLEEP_DURATION_MINUTES.into(), Value::from(obs.sleep_duration_minutes));
                payload.insert(fields::RESTING_HEART_RATE.into(), Value::from(obs.resting_heart_rate));
                payload.insert(fields::STRESS_NUM.into(), Value::from(obs.stress_num));
                payload.insert(fields::CRAMPS_NUM.into(), Value::from(obs.cramps_num));
                payload.insert(fields::HEADACHES_NUM.into(), Value::from(obs.headaches_num));
                payload.insert(fields::SLEEPISSUE_NUM.into(), Value::from(obs.sleepissue_num));
            }
            None => {
                payload.insert(fields::PHASE.into(), Value::from(PHASE_VALUES[0]));
                payload.insert(fields::SLEEP_DURATION_MINUTES.into(), Value::from(DEFAULT_SLEEP_MINUTES));
                payload.insert(fields::RESTING_HEART_RATE.into(), Value::from(DEFAULT_RESTING_HEART_RATE));
                payload.insert(fields::STRESS_NUM.into(), Value::from(DEFAULT_STRESS));
                for field in [fields::CRAMPS_NUM, fields::HEADACHES_NUM, fields::SLEEPISSUE_NUM] {
                    payload.insert(field.into(), Value::from(0));
                }
            }
        }
        payload.insert(fields::IS_WEEKEND.into(), Value::from(weekend));
        Ok(payload)
    }

    /// Record the actual mood and/or energy of a saved day
    pub fn label(&self, entry_date: NaiveDate, mood: Option<Level>, energy: Option<Level>) -> Result<bool> {
        self.store.label(entry_date, mood, energy)
    }

    /// Saved days in an inclusive range
    pub fn history(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Vec<StoredRecord>> {
        InputValidator::validate_date_range(start, end)?;
        self.store.fetch_range(start, end)
    }

    /// One saved day
    pub fn day(&self, entry_date: NaiveDate) -> Result<Option<StoredRecord>> {
        self.store.fetch_one(entry_date)
    }

    /// Forget a saved day
    pub fn delete(&self, entry_date: NaiveDate) -> Result<bool> {
        self.store.delete(entry_date)
    }

    /// Calendar cells and summary for one month
    pub fn month(&self, year: i32, month: u32) -> Result<(Vec<DayCell>, MonthSummary)> {
        let (first, last) = month_bounds(year, month)?;
        let records = self.store.fetch_range(Some(first), Some(last))?;
        Ok((
            month_days(year, month, &records)?,
            MonthSummary::from_records(year, month, &records)?,
        ))
    }

    /// Trend series over an inclusive range
    pub fn trends(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<TrendSeries> {
        Ok(TrendSeries::from_records(&self.history(start, end)?))
    }

    /// Export saved days to `path`; returns how many were written
    pub fn export(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        format: ExportFormat,
        path: &Path,
    ) -> Result<usize> {
        InputValidator::validate_file_path(path)?;
        let records = self.history(start, end)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        write_records_to_file(&records, format, path)?;
        Ok(records.len())
    }

    /// Export saved days into a fresh timestamped directory under `output_dir`
    pub fn export_to_dir(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        format: ExportFormat,
        output_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        InputValidator::validate_file_path(output_dir)?;
        let records = self.history(start, end)?;
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        write_records_to_timestamped_dir(&records, format, output_dir, &timestamp)
    }
}
