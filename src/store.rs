use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use indexmap::IndexMap;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Type, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{Result, WellbeingError};
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::models::{Level, Observation, PredictionResult, Route, StoredRecord};
use crate::schema::{daily_entries, schema_migrations, MIGRATIONS};

/// Pool of SQLite connections
pub type DbPool = Pool<SqliteConnectionManager>;
/// Connection checked out of [`DbPool`]
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

impl FromSql for Route {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: WellbeingError| FromSqlError::Other(Box::new(e)))
    }
}

/// Columns to write for one day.
///
/// On conflict only the columns present here are overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    entry_date: NaiveDate,
    values: IndexMap<&'static str, Value>,
}

impl RecordUpdate {
    /// Empty update for `entry_date`
    #[must_use]
    pub fn new(entry_date: NaiveDate) -> Self {
        Self {
            entry_date,
            values: IndexMap::new(),
        }
    }

    /// Set one column
    #[must_use]
    pub fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.values.insert(column, value.into());
        self
    }

    /// Every observation column; absent lags become NULL
    #[must_use]
    pub fn observation(entry_date: NaiveDate, obs: &Observation) -> Self {
        Self::new(entry_date)
            .set(daily_entries::PHASE, obs.phase.clone())
            .set(daily_entries::IS_WEEKEND, obs.is_weekend)
            .set(daily_entries::SLEEP_DURATION_MINUTES, obs.sleep_duration_minutes)
            .set(daily_entries::RESTING_HEART_RATE, obs.resting_heart_rate)
            .set(daily_entries::CRAMPS_NUM, obs.cramps_num)
            .set(daily_entries::HEADACHES_NUM, obs.headaches_num)
            .set(daily_entries::SLEEPISSUE_NUM, obs.sleepissue_num)
            .set(daily_entries::STRESS_NUM, obs.stress_num)
            .set(daily_entries::LAG1_MOOD, obs.lags.map(|l| l.mood))
            .set(daily_entries::LAG1_ENERGY, obs.lags.map(|l| l.energy))
    }

    /// Observation plus prediction, the full save of a logged day
    pub fn from_prediction(
        entry_date: NaiveDate,
        obs: &Observation,
        prediction: &PredictionResult,
    ) -> Result<Self> {
        Ok(Self::observation(entry_date, obs)
            .set(daily_entries::MOOD_PRED, i64::from(prediction.mood_pred))
            .set(daily_entries::ENERGY_PRED, i64::from(prediction.energy_pred))
            .set(daily_entries::ROUTE, prediction.route.as_str().to_string())
            .set(daily_entries::MOOD_PROBA, proba_json(prediction.mood_proba.as_deref())?)
            .set(daily_entries::ENERGY_PROBA, proba_json(prediction.energy_proba.as_deref())?))
    }

    /// Ground-truth columns only; `None` leaves a column untouched
    #[must_use]
    pub fn ground_truth(entry_date: NaiveDate, mood: Option<Level>, energy: Option<Level>) -> Self {
        let mut update = Self::new(entry_date);
        if let Some(mood) = mood {
            update = update.set(daily_entries::GT_MOOD, i64::from(mood.class()));
        }
        if let Some(energy) = energy {
            update = update.set(daily_entries::GT_ENERGY, i64::from(energy.class()));
        }
        update
    }

    /// Key of the day being written
    #[must_use]
    pub const fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    /// Columns this update writes, in order
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.keys().copied()
    }

    /// Value written to `column`, if any
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    fn check(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(WellbeingError::validation("update", "no columns to write"));
        }
        match self
            .columns()
            .find(|c| !daily_entries::WRITABLE_COLUMNS.contains(c))
        {
            Some(column) => Err(WellbeingError::validation(column, "not a writable column")),
            None => Ok(()),
        }
    }
}

fn proba_json(proba: Option<&[f64]>) -> Result<Option<String>> {
    proba.map(serde_json::to_string).transpose().map_err(Into::into)
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// SQLite-backed store of one record per calendar date
pub struct RecordStore {
    pool: DbPool,
    metrics: MetricsCollector,
}

impl RecordStore {
    /// Open (creating if needed) the database at `path` and run migrations.
    ///
    /// Every pooled connection runs in WAL mode with `busy_timeout`, so readers
    /// proceed during a write and writers wait for each other.
    pub fn open(path: impl AsRef<Path>, pool_size: u32, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")
        });
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;

        let mut conn = pool.get()?;
        Self::run_migrations(&mut conn)?;
        info!(path = %path.display(), pool_size, "Record store opened");

        Ok(Self {
            pool,
            metrics: MetricsCollector::default(),
        })
    }

    /// Apply every migration not yet recorded, each in its own transaction
    fn run_migrations(conn: &mut Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({} TEXT PRIMARY KEY NOT NULL, {} TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            schema_migrations::TABLE,
            schema_migrations::VERSION,
            schema_migrations::APPLIED_AT
        ))?;

        for (version, sql) in MIGRATIONS {
            let tx = conn.transaction()?;
            let applied: bool = tx.query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
                    schema_migrations::TABLE,
                    schema_migrations::VERSION
                ),
                params![version],
                |row| row.get(0),
            )?;
            if applied {
                continue;
            }
            tx.execute_batch(sql)?;
            tx.execute(
                &format!(
                    "INSERT INTO {} ({}) VALUES (?1)",
                    schema_migrations::TABLE,
                    schema_migrations::VERSION
                ),
                params![version],
            )?;
            tx.commit()?;
            info!(version, "Applied migration");
        }
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    fn timed<T>(&self, operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let timer = MetricsTimer::new(self.metrics, operation);
        let result = f();
        let duration = timer.finish(result.is_ok());
        debug!(operation, duration_ms = duration.as_millis(), ok = result.is_ok(), "Store operation");
        result
    }

    /// Insert the day or overwrite only the supplied columns of an existing one.
    ///
    /// An existing day is updated in place so omitted columns keep their stored
    /// values. A new day needs every observation column; a partial update of a
    /// missing day fails with a database constraint error.
    pub fn upsert(&self, update: &RecordUpdate) -> Result<()> {
        update.check()?;
        self.timed("upsert", || {
            let columns: Vec<&str> = update.columns().collect();
            let assignments: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{c} = ?{}", i + 2))
                .collect();
            let update_sql = format!(
                "UPDATE {} SET {} WHERE {} = ?1",
                daily_entries::TABLE,
                assignments.join(", "),
                daily_entries::ENTRY_DATE
            );
            let placeholders: Vec<String> = (2..=columns.len() + 1).map(|i| format!("?{i}")).collect();
            let insert_sql = format!(
                "INSERT INTO {} ({}, {}) VALUES (?1, {})",
                daily_entries::TABLE,
                daily_entries::ENTRY_DATE,
                columns.join(", "),
                placeholders.join(", "),
            );

            let mut values = Vec::with_capacity(columns.len() + 1);
            values.push(Value::Text(date_key(update.entry_date)));
            values.extend(update.values.values().cloned());

            let mut conn = self.get_connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let changed = tx.execute(&update_sql, params_from_iter(values.iter()))?;
            let inserted = changed == 0;
            if inserted {
                tx.execute(&insert_sql, params_from_iter(values.iter()))?;
            }
            tx.commit()?;
            info!(entry_date = %update.entry_date, columns = columns.len(), inserted, "Upserted day");
            Ok(())
        })
    }

    /// Record actual levels for a saved day; `false` when the day does not exist
    pub fn label(&self, entry_date: NaiveDate, mood: Option<Level>, energy: Option<Level>) -> Result<bool> {
        let update = RecordUpdate::ground_truth(entry_date, mood, energy);
        update.check()?;
        self.timed("label", || {
            let assignments: Vec<String> = update
                .columns()
                .enumerate()
                .map(|(i, c)| format!("{c} = ?{}", i + 2))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?1",
                daily_entries::TABLE,
                assignments.join(", "),
                daily_entries::ENTRY_DATE
            );
            let mut values = vec![Value::Text(date_key(entry_date))];
            values.extend(update.values.values().cloned());

            let conn = self.get_connection()?;
            let changed = conn.execute(&sql, params_from_iter(values))?;
            Ok(changed > 0)
        })
    }

    /// Days between `start` and `end`, both inclusive and optional, oldest first
    pub fn fetch_range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Vec<StoredRecord>> {
        self.timed("fetch_range", || {
            let mut query = format!(
                "SELECT {} FROM {} WHERE 1 = 1",
                daily_entries::ALL_COLUMNS.join(", "),
                daily_entries::TABLE
            );
            let mut bounds: Vec<String> = Vec::new();

            if let Some(start) = start {
                bounds.push(date_key(start));
                query.push_str(&format!(" AND {} >= ?{}", daily_entries::ENTRY_DATE, bounds.len()));
            }
            if let Some(end) = end {
                bounds.push(date_key(end));
                query.push_str(&format!(" AND {} <= ?{}", daily_entries::ENTRY_DATE, bounds.len()));
            }
            query.push_str(&format!(" ORDER BY {} ASC", daily_entries::ENTRY_DATE));

            let conn = self.get_connection()?;
            let mut stmt = conn.prepare(&query)?;
            let records = stmt
                .query_map(params_from_iter(bounds.iter()), map_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    /// One saved day, `None` when absent
    pub fn fetch_one(&self, entry_date: NaiveDate) -> Result<Option<StoredRecord>> {
        self.timed("fetch_one", || {
            let conn = self.get_connection()?;
            let record = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM {} WHERE {} = ?1",
                        daily_entries::ALL_COLUMNS.join(", "),
                        daily_entries::TABLE,
                        daily_entries::ENTRY_DATE
                    ),
                    params![date_key(entry_date)],
                    map_record,
                )
                .optional()?;
            Ok(record)
        })
    }

    /// Remove a saved day; `false` when there was nothing to remove
    pub fn delete(&self, entry_date: NaiveDate) -> Result<bool> {
        self.timed("delete", || {
            let conn = self.get_connection()?;
            let removed = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    daily_entries::TABLE,
                    daily_entries::ENTRY_DATE
                ),
                params![date_key(entry_date)],
            )?;
            if removed > 0 {
                info!(%entry_date, "Deleted day");
            }
            Ok(removed > 0)
        })
    }
}

fn proba_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Vec<f64>>> {
    let Some(text) = row.get::<_, Option<String>>(column)? else {
        return Ok(None);
    };
    serde_json::from_str(&text).map(Some).map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        entry_date: row.get(daily_entries::ENTRY_DATE)?,
        phase: row.get(daily_entries::PHASE)?,
        is_weekend: row.get(daily_entries::IS_WEEKEND)?,
        sleep_duration_minutes: row.get(daily_entries::SLEEP_DURATION_MINUTES)?,
        resting_heart_rate: row.get(daily_entries::RESTING_HEART_RATE)?,
        cramps_num: row.get(daily_entries::CRAMPS_NUM)?,
        headaches_num: row.get(daily_entries::HEADACHES_NUM)?,
        sleepissue_num: row.get(daily_entries::SLEEPISSUE_NUM)?,
        stress_num: row.get(daily_entries::STRESS_NUM)?,
        lag1_mood: row.get(daily_entries::LAG1_MOOD)?,
        lag1_energy: row.get(daily_entries::LAG1_ENERGY)?,
        gt_mood: row.get(daily_entries::GT_MOOD)?,
        gt_energy: row.get(daily_entries::GT_ENERGY)?,
        mood_pred: row.get(daily_entries::MOOD_PRED)?,
        energy_pred: row.get(daily_entries::ENERGY_PRED)?,
        route: row.get(daily_entries::ROUTE)?,
        mood_proba: proba_column(row, daily_entries::MOOD_PROBA)?,
        energy_proba: proba_column(row, daily_entries::ENERGY_PROBA)?,
        created_at: row.get(daily_entries::CREATED_AT)?,
    })
}
