//! Error types for the wellbeing-explorer library.
//!
//! This module provides custom error types using `thiserror` so that callers can
//! tell a rejected payload apart from a broken model or a failing disk.

use thiserror::Error;

/// Errors that can occur in the wellbeing-explorer library.
#[derive(Error, Debug)]
pub enum WellbeingError {
    /// A required input field is missing or cannot be coerced
    #[error("invalid field `{field}`: {reason}")]
    Validation {
        /// Name of the offending field
        field: String,
        /// What was wrong with it
        reason: String,
    },

    /// A model or artifact is unusable as configured
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested model/version does not exist in the model source
    #[error("model `{name}` version {version} not found")]
    ModelNotFound {
        /// Logical model name
        name: String,
        /// Requested version
        version: u32,
    },

    /// The model source could not be reached or read
    #[error("model source error: {0}")]
    ModelSource(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid date format
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML artifact errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl WellbeingError {
    /// Build a validation error for `field`.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Short label used for error metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Configuration(_) => "configuration",
            Self::ModelNotFound { .. } | Self::ModelSource(_) => "model_source",
            Self::Database(_) | Self::Pool(_) => "database",
            Self::Io(_) => "io",
            Self::InvalidDate(_) => "invalid_date",
            Self::Serialization(_) | Self::Yaml(_) | Self::Csv(_) => "serialization",
        }
    }
}

/// Convenience type alias for Result with `WellbeingError`
pub type Result<T> = std::result::Result<T, WellbeingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = WellbeingError::validation("sleep_duration_minutes", "must be int-like, got \"abc\"");
        assert_eq!(
            err.to_string(),
            "invalid field `sleep_duration_minutes`: must be int-like, got \"abc\""
        );
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_model_not_found_message() {
        let err = WellbeingError::ModelNotFound {
            name: "mood".to_string(),
            version: 2,
        };
        assert_eq!(err.to_string(), "model `mood` version 2 not found");
        assert_eq!(err.kind(), "model_source");
    }
}
