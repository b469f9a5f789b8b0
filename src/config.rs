use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::predictor::ModelNames;

/// Environment variable that overrides `database.path`
pub const DB_PATH_ENV: &str = "WELLBEING_DB_PATH";

/// Application configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Record store settings
    pub database: DatabaseConfig,
    /// Log level and optional file output
    pub logging: LoggingConfig,
    /// Model registry, cache and model names
    pub models: ModelsConfig,
    /// Export destination
    pub export: ExportConfig,
}

/// SQLite record store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file, created with its parent directory on first open
    pub path: String,
    /// Pool size
    pub max_connections: u32,
    /// How long a connection waits on a locked database
    pub busy_timeout_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Daily rolling log file; stderr only when unset
    pub file_path: Option<String>,
    /// File log format
    pub format: String, // "json" or "text"
}

/// Model registry settings and the four logical model names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Root of the `<name>/<version>/` layout
    pub registry_dir: String,
    /// Version loaded for every name
    pub version: u32,
    /// Most models kept loaded at once
    pub cache_capacity: usize,
    /// Mood model without lags
    pub mood_mode_a: String,
    /// Mood model with yesterday's levels
    pub mood_mode_b: String,
    /// Energy model without lags
    pub energy_mode_a: String,
    /// Energy model with yesterday's levels
    pub energy_mode_b: String,
}

/// Export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Parent of the timestamped export directories
    pub output_directory: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/wellbeing.db".to_string(),
            max_connections: 4,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            format: "text".to_string(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let names = ModelNames::default();
        Self {
            registry_dir: "models".to_string(),
            version: 1,
            cache_capacity: 8,
            mood_mode_a: names.mood_a,
            mood_mode_b: names.mood_b,
            energy_mode_a: names.energy_a,
            energy_mode_b: names.energy_b,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_directory: "./output".to_string(),
        }
    }
}

impl ModelsConfig {
    /// Logical model names for the predictor
    #[must_use]
    pub fn names(&self) -> ModelNames {
        ModelNames {
            mood_a: self.mood_mode_a.clone(),
            mood_b: self.mood_mode_b.clone(),
            energy_a: self.energy_mode_a.clone(),
            energy_b: self.energy_mode_b.clone(),
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// defaults, `config/default.*`, `config/local.*`, then `WELLBEING_*` variables.
    pub fn load() -> Result<Self> {
        Self::load_from(
            "config",
            Environment::with_prefix("WELLBEING")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Load with an explicit config directory and environment source
    pub fn load_from(config_dir: impl Into<PathBuf>, environment: Environment) -> Result<Self> {
        let config_dir = config_dir.into();
        let defaults = Config::try_from(&Self::default()).context("Failed to serialize default configuration")?;

        let config = Config::builder()
            // Start with default values
            .add_source(defaults)
            // Add config files if they exist
            .add_source(File::from(config_dir.join("default")).required(false))
            .add_source(File::from(config_dir.join("local")).required(false))
            // Add environment variables with prefix
            .add_source(environment)
            .build()
            .context("Failed to load configuration")?;

        let mut app_config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            app_config.database.path = path;
        }

        app_config.validate()?;
        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate database config
        if self.database.path.trim().is_empty() {
            anyhow::bail!("database.path cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("max_connections must be greater than 0");
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            );
        }

        // Validate model config
        if self.models.registry_dir.trim().is_empty() {
            anyhow::bail!("models.registry_dir cannot be empty");
        }
        if self.models.version == 0 {
            anyhow::bail!("models.version must be at least 1");
        }
        let names = self.models.names();
        if [&names.mood_a, &names.mood_b, &names.energy_a, &names.energy_b]
            .iter()
            .any(|n| n.trim().is_empty())
        {
            anyhow::bail!("model names cannot be empty");
        }
        let distinct: HashSet<&String> = [&names.mood_a, &names.mood_b, &names.energy_a, &names.energy_b]
            .into_iter()
            .collect();
        if self.models.cache_capacity < distinct.len() {
            anyhow::bail!(
                "models.cache_capacity ({}) must hold all {} configured models",
                self.models.cache_capacity,
                distinct.len()
            );
        }

        // Validate export config
        if self.export.output_directory.trim().is_empty() {
            anyhow::bail!("export.output_directory cannot be empty");
        }

        Ok(())
    }

    /// Busy timeout as a duration
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database.path, "data/wellbeing.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.models.cache_capacity, 8);
        assert_eq!(config.models.mood_mode_a, "mcphases_mood_modea_randomforest");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
