//! Wellbeing Explorer - daily health log with mood and energy prediction
//!
//! A Rust library for logging one observation per day, predicting mood and
//! energy levels with pre-trained classifiers, and reviewing saved days.
//!
//! # Features
//!
//! - Payload normalization with clamping and one-hot phase encoding
//! - Lag-aware routing between two model variants
//! - File-based model registry with a shared model cache
//! - SQLite persistence with column-wise upsert
//! - Month summaries, trend series and CSV/JSON export

/// Registry cleanup by name prefix
pub mod cleanup;
/// Shared model cache
pub mod cache;
/// Configuration management
pub mod config;
/// Error types
pub mod error;
/// Saved-day exports
pub mod export;
/// Payload normalization and feature rows
pub mod features;
/// Month views, trends and summaries
pub mod history;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Classifier trait and model artifacts
pub mod model;
/// Data models and structures
pub mod models;
/// Prediction request pipeline
pub mod predictor;
/// Model sources
pub mod registry;
/// Database schema definitions
pub mod schema;
/// Predict-and-save front door
pub mod service;
/// Record store
pub mod store;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use error::{Result, WellbeingError};
pub use features::{input_schema, normalize, Payload};
pub use models::{Level, Observation, PredictionResult, Route, StoredRecord};
pub use predictor::{ModelNames, Predictor};
pub use service::WellbeingService;
pub use store::{RecordStore, RecordUpdate};
