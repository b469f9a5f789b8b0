//! File writing utilities for exporting saved days.
//!
//! Records are written as CSV (one header row, one line per day, columns in
//! table order) or as a JSON array.

use std::fmt;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::Writer;

use crate::error::{Result, WellbeingError};
use crate::metrics::MetricsCollector;
use crate::models::StoredRecord;
use crate::schema::daily_entries;

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
    /// Pretty-printed JSON array
    Json,
}

impl ExportFormat {
    /// File extension, without the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = WellbeingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(WellbeingError::validation(
                "format",
                format!("unknown export format {other:?}, expected csv or json"),
            )),
        }
    }
}

/// Write records into `output_dir/<timestamp>/entries.<ext>`.
///
/// Returns `None` without creating anything when there are no records.
pub fn write_records_to_timestamped_dir(
    records: &[StoredRecord],
    format: ExportFormat,
    output_dir: &Path,
    timestamp: &str,
) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        return Ok(None);
    }

    let date_dir = output_dir.join(timestamp);
    create_dir_all(&date_dir)?;
    let file_path = date_dir.join(format!("entries.{}", format.extension()));
    write_records_to_file(records, format, &file_path)?;
    Ok(Some(file_path))
}

/// Write records to a file in the specified format.
pub fn write_records_to_file(records: &[StoredRecord], format: ExportFormat, file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    match format {
        ExportFormat::Csv => write_csv(records, file)?,
        ExportFormat::Json => write_json(records, file)?,
    }
    MetricsCollector::default().record_export(records.len());
    tracing::info!(rows = records.len(), path = %file_path.display(), %format, "Exported records");
    Ok(())
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn proba_cell(proba: Option<&Vec<f64>>) -> Result<String> {
    Ok(proba.map(serde_json::to_string).transpose()?.unwrap_or_default())
}

/// Write records as CSV.
///
/// Header row is the table's column list; absent values are empty cells.
pub fn write_csv<W: Write>(records: &[StoredRecord], writer: W) -> Result<()> {
    let mut writer = Writer::from_writer(writer);
    writer.write_record(daily_entries::ALL_COLUMNS)?;

    for record in records {
        writer.write_record([
            record.entry_date.format("%Y-%m-%d").to_string(),
            record.phase.clone(),
            record.is_weekend.to_string(),
            record.sleep_duration_minutes.to_string(),
            record.resting_heart_rate.to_string(),
            record.cramps_num.to_string(),
            record.headaches_num.to_string(),
            record.sleepissue_num.to_string(),
            record.stress_num.to_string(),
            optional(record.lag1_mood),
            optional(record.lag1_energy),
            optional(record.gt_mood),
            optional(record.gt_energy),
            optional(record.mood_pred),
            optional(record.energy_pred),
            optional(record.route),
            proba_cell(record.mood_proba.as_ref())?,
            proba_cell(record.energy_proba.as_ref())?,
            optional(record.created_at.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write records as a pretty JSON array.
pub fn write_json<W: Write>(records: &[StoredRecord], writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("txt".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_empty_export_creates_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let written =
            write_records_to_timestamped_dir(&[], ExportFormat::Csv, dir.path(), "2024-01-01_00-00-00").unwrap();
        assert!(written.is_none());
        assert!(!dir.path().join("2024-01-01_00-00-00").exists());
    }
}
