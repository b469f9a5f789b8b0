use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

use crate::models::Route;

/// Metric names emitted through the `metrics` facade.
///
/// The crate never installs a recorder; whichever exporter the host process
/// sets up receives these.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCollector {
    /// Predictions served, by route
    pub predictions_total: &'static str,
    /// Prediction latency histogram
    pub prediction_duration: &'static str,
    /// Payloads rejected before any model load
    pub validation_failures_total: &'static str,

    /// Model artifact loads, by model and status
    pub model_loads_total: &'static str,
    /// Models currently cached
    pub model_cache_size: &'static str,

    /// Store operations, by operation and status
    pub store_operations_total: &'static str,
    /// Store operation latency histogram
    pub store_operation_duration: &'static str,

    /// Rows written by exports
    pub export_rows_total: &'static str,
    /// Cleanup outcomes, by outcome kind
    pub cleanup_outcomes_total: &'static str,

    /// Errors, by type and operation
    pub errors_total: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            predictions_total: "wellbeing_predictions_total",
            prediction_duration: "wellbeing_prediction_duration_seconds",
            validation_failures_total: "wellbeing_validation_failures_total",

            model_loads_total: "wellbeing_model_loads_total",
            model_cache_size: "wellbeing_model_cache_size",

            store_operations_total: "wellbeing_store_operations_total",
            store_operation_duration: "wellbeing_store_operation_duration_seconds",

            export_rows_total: "wellbeing_export_rows_total",
            cleanup_outcomes_total: "wellbeing_cleanup_outcomes_total",

            errors_total: "wellbeing_errors_total",
        }
    }
}

const fn status(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

impl MetricsCollector {
    /// Record a served prediction
    pub fn record_prediction(&self, route: Route, duration: Duration) {
        counter!(self.predictions_total, "route" => route.as_str()).increment(1);
        histogram!(self.prediction_duration, "route" => route.as_str()).record(duration.as_secs_f64());
    }

    /// Record a payload rejected by the normalizer
    pub fn record_validation_failure(&self, field: &str) {
        counter!(self.validation_failures_total, "field" => field.to_string()).increment(1);
    }

    /// Record an attempt to load a model from its source
    pub fn record_model_load(&self, name: &str, success: bool) {
        counter!(
            self.model_loads_total,
            "model" => name.to_string(),
            "status" => status(success)
        )
        .increment(1);
    }

    /// Update the number of models held by the cache
    #[allow(clippy::cast_precision_loss)]
    pub fn update_model_cache_size(&self, size: usize) {
        gauge!(self.model_cache_size).set(size as f64);
    }

    /// Record a record-store operation
    pub fn record_store_operation(&self, operation: &'static str, duration: Duration, success: bool) {
        counter!(
            self.store_operations_total,
            "operation" => operation,
            "status" => status(success)
        )
        .increment(1);
        histogram!(self.store_operation_duration, "operation" => operation).record(duration.as_secs_f64());

        if !success {
            self.record_error("database", operation);
        }
    }

    /// Record rows written by an export
    pub fn record_export(&self, rows: usize) {
        counter!(self.export_rows_total).increment(rows as u64);
    }

    /// Record one cleanup outcome
    pub fn record_cleanup_outcome(&self, outcome: &'static str) {
        counter!(self.cleanup_outcomes_total, "outcome" => outcome).increment(1);
    }

    /// Record an error by kind and the operation that raised it
    pub fn record_error(&self, error_type: &'static str, operation: &'static str) {
        counter!(self.errors_total, "type" => error_type, "operation" => operation).increment(1);
    }
}

/// Times one store operation and reports it when finished
pub struct MetricsTimer {
    collector: MetricsCollector,
    operation: &'static str,
    start: Instant,
}

impl MetricsTimer {
    /// Start timing `operation`
    #[must_use]
    pub fn new(collector: MetricsCollector, operation: &'static str) -> Self {
        Self {
            collector,
            operation,
            start: Instant::now(),
        }
    }

    /// Record the operation outcome and its duration
    pub fn finish(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        self.collector
            .record_store_operation(self.operation, duration, success);
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_are_prefixed() {
        let collector = MetricsCollector::default();
        for name in [
            collector.predictions_total,
            collector.model_loads_total,
            collector.store_operations_total,
            collector.errors_total,
        ] {
            assert!(name.starts_with("wellbeing_"), "{name}");
        }
    }

    #[test]
    fn test_recording_without_recorder_is_a_noop() {
        let collector = MetricsCollector::default();
        collector.record_prediction(Route::B, Duration::from_millis(3));
        collector.record_validation_failure("phase");
        let timer = MetricsTimer::new(collector, "fetch_one");
        assert!(timer.finish(true) < Duration::from_secs(5));
    }
}
