//! Database schema definitions
//!
//! Table and column names used with rusqlite, plus the ordered migration list.

/// Daily entries table schema
pub mod daily_entries {
    /// Table name
    pub const TABLE: &str = "daily_entries";
    /// Calendar date, `YYYY-MM-DD`, primary key
    pub const ENTRY_DATE: &str = "entry_date";
    /// Raw cycle-phase label
    pub const PHASE: &str = "phase";
    /// Weekend flag
    pub const IS_WEEKEND: &str = "is_weekend";
    /// Sleep in minutes
    pub const SLEEP_DURATION_MINUTES: &str = "sleep_duration_minutes";
    /// Resting heart rate in bpm
    pub const RESTING_HEART_RATE: &str = "resting_heart_rate";
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
    /// Recorded actual mood
    pub const GT_MOOD: &str = "gt_mood";
    /// Recorded actual energy
    pub const GT_ENERGY: &str = "gt_energy";
    /// Predicted mood class
    pub const MOOD_PRED: &str = "mood_pred";
    /// Predicted energy class
    pub const ENERGY_PRED: &str = "energy_pred";
    /// Route identifier, "A" or "B"
    pub const ROUTE: &str = "route";
    /// Mood class probabilities as a JSON array
    pub const MOOD_PROBA: &str = "mood_proba";
    /// Energy class probabilities as a JSON array
    pub const ENERGY_PROBA: &str = "energy_proba";
    /// Insert timestamp, set by SQLite
    pub const CREATED_AT: &str = "created_at";

    /// Observation columns, all written on every full save
    pub const OBSERVATION_COLUMNS: [&str; 10] = [
        PHASE,
        IS_WEEKEND,
        SLEEP_DURATION_MINUTES,
        RESTING_HEART_RATE,
        CRAMPS_NUM,
        HEADACHES_NUM,
        SLEEPISSUE_NUM,
        STRESS_NUM,
        LAG1_MOOD,
        LAG1_ENERGY,
    ];

    /// Columns an upsert may write
    pub const WRITABLE_COLUMNS: [&str; 17] = [
        PHASE,
        IS_WEEKEND,
        SLEEP_DURATION_MINUTES,
        RESTING_HEART_RATE,
        CRAMPS_NUM,
        HEADACHES_NUM,
        SLEEPISSUE_NUM,
        STRESS_NUM,
        LAG1_MOOD,
        LAG1_ENERGY,
        GT_MOOD,
        GT_ENERGY,
        MOOD_PRED,
        ENERGY_PRED,
        ROUTE,
        MOOD_PROBA,
        ENERGY_PROBA,
    ];

    /// Every column, in the order records are selected and exported
    pub const ALL_COLUMNS: [&str; 19] = [
        ENTRY_DATE,
        PHASE,
        IS_WEEKEND,
        SLEEP_DURATION_MINUTES,
        RESTING_HEART_RATE,
        CRAMPS_NUM,
        HEADACHES_NUM,
        SLEEPISSUE_NUM,
        STRESS_NUM,
        LAG1_MOOD,
        LAG1_ENERGY,
        GT_MOOD,
        GT_ENERGY,
        MOOD_PRED,
        ENERGY_PRED,
        ROUTE,
        MOOD_PROBA,
        ENERGY_PROBA,
        CREATED_AT,
    ];
}

/// Applied-migration bookkeeping table
pub mod schema_migrations {
    /// Table name
    pub const TABLE: &str = "schema_migrations";
    /// Migration identifier
    pub const VERSION: &str = "version";
    /// When it was applied
    pub const APPLIED_AT: &str = "applied_at";
}

/// Migrations in application order: (version, SQL)
pub const MIGRATIONS: [(&str, &str); 2] = [
    (
        "2024-06-01-000000_create_daily_entries",
        include_str!("../migrations/2024-06-01-000000_create_daily_entries/up.sql"),
    ),
    (
        "2024-06-15-000000_add_class_probabilities",
        include_str!("../migrations/2024-06-15-000000_add_class_probabilities/up.sql"),
    ),
];
