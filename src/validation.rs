use std::path::Path;

use chrono::NaiveDate;

use crate::error::{Result, WellbeingError};
use crate::models::Level;

/// Validation utilities for command-line and caller input
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Parse an entry date written as `YYYY-MM-DD`
    pub fn parse_entry_date(input: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .map_err(|e| WellbeingError::InvalidDate(format!("{input:?}: {e} (expected YYYY-MM-DD)")))
    }

    /// Validate an inclusive date range; only a reversed range is rejected
    pub fn validate_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
        if let (Some(start_date), Some(end_date)) = (start, end) {
            if start_date > end_date {
                return Err(WellbeingError::InvalidDate(format!(
                    "start date {start_date} is after end date {end_date}"
                )));
            }
        }

        Ok(())
    }

    /// Validate a model-name prefix used for bulk cleanup
    pub fn validate_model_prefix(prefix: &str) -> Result<()> {
        if prefix.trim().is_empty() {
            return Err(WellbeingError::validation("prefix", "cannot be empty"));
        }

        if prefix.len() > 100 {
            return Err(WellbeingError::validation("prefix", "too long (max 100 characters)"));
        }

        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(WellbeingError::validation(
                "prefix",
                "may only contain letters, digits, '_' and '-'",
            ));
        }

        Ok(())
    }

    /// Validate an output file path
    pub fn validate_file_path(path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        if path_str.trim().is_empty() {
            return Err(WellbeingError::validation("path", "cannot be empty"));
        }

        // Check for path traversal attempts
        if path_str.contains("..") || path_str.contains('~') {
            return Err(WellbeingError::validation(
                "path",
                "contains potentially dangerous characters",
            ));
        }

        if path_str.len() > 4096 {
            return Err(WellbeingError::validation("path", "too long (max 4096 characters)"));
        }

        Ok(())
    }

    /// Validate a recorded mood or energy level (0, 1 or 2)
    pub fn validate_level(field: &str, value: i64) -> Result<Level> {
        Level::from_class(value)
            .ok_or_else(|| WellbeingError::validation(field, format!("must be 0, 1 or 2, got {value}")))
    }

    /// Validate a calendar month
    pub fn validate_month(year: i32, month: u32) -> Result<()> {
        if !(1..=12).contains(&month) {
            return Err(WellbeingError::InvalidDate(format!("month {month} is not in 1-12")));
        }
        if !(1900..=9999).contains(&year) {
            return Err(WellbeingError::InvalidDate(format!("year {year} is out of range")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry_date() {
        assert_eq!(
            InputValidator::parse_entry_date(" 2024-02-29 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(matches!(
            InputValidator::parse_entry_date("2023-02-29"),
            Err(WellbeingError::InvalidDate(_))
        ));
        assert!(InputValidator::parse_entry_date("29/02/2024").is_err());
    }

    #[test]
    fn test_prefix_rules() {
        assert!(InputValidator::validate_model_prefix("mcphases_").is_ok());
        assert!(InputValidator::validate_model_prefix("").is_err());
        assert!(InputValidator::validate_model_prefix("../models").is_err());
    }
}
