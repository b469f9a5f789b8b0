//! Prediction request pipeline.
//!
//! payload → [`normalize`] → [`FeatureRow`] → route → cached models →
//! aligned rows → classes and probabilities.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::ModelCache;
use crate::error::{Result, WellbeingError};
use crate::features::{normalize, AlignedFeatures, FeatureRow, Payload};
use crate::metrics::MetricsCollector;
use crate::model::Classifier;
use crate::models::{Observation, PredictionResult, Route};
use crate::registry::ModelSource;

/// Logical names of the four model variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelNames {
    /// Mood model without lags
    pub mood_a: String,
    /// Mood model with lags
    pub mood_b: String,
    /// Energy model without lags
    pub energy_a: String,
    /// Energy model with lags
    pub energy_b: String,
}

impl Default for ModelNames {
    fn default() -> Self {
        Self {
            mood_a: "mcphases_mood_modea_randomforest".to_string(),
            mood_b: "mcphases_mood_modeb_randomforest".to_string(),
            energy_a: "mcphases_energy_modea_randomforest".to_string(),
            energy_b: "mcphases_energy_modeb_randomforest".to_string(),
        }
    }
}

impl ModelNames {
    /// (mood, energy) model names serving `route`
    #[must_use]
    pub fn for_route(&self, route: Route) -> (&str, &str) {
        match route {
            Route::A => (&self.mood_a, &self.energy_a),
            Route::B => (&self.mood_b, &self.energy_b),
        }
    }

    /// Number of different names, which is what a cache must hold
    #[must_use]
    pub fn distinct(&self) -> usize {
        let mut names = vec![&self.mood_a, &self.mood_b, &self.energy_a, &self.energy_b];
        names.sort();
        names.dedup();
        names.len()
    }
}

/// A validated request with its model inputs, before any class is predicted
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// Variant pair serving both targets
    pub route: Route,
    /// Clamped observation
    pub observation: Observation,
    /// Canonical feature row
    pub row: FeatureRow,
    /// Row aligned to the mood model
    pub mood: AlignedFeatures,
    /// Row aligned to the energy model
    pub energy: AlignedFeatures,
    mood_model: Arc<dyn Classifier>,
    energy_model: Arc<dyn Classifier>,
}

/// Predicts mood and energy classes for raw payloads
pub struct Predictor {
    cache: Arc<ModelCache>,
    source: Arc<dyn ModelSource>,
    names: ModelNames,
    metrics: MetricsCollector,
}

impl Predictor {
    /// Predictor drawing models from `source` through `cache`
    pub fn new(cache: Arc<ModelCache>, source: Arc<dyn ModelSource>, names: ModelNames) -> Self {
        Self {
            cache,
            source,
            names,
            metrics: MetricsCollector::default(),
        }
    }

    /// Model names in use
    #[must_use]
    pub const fn names(&self) -> &ModelNames {
        &self.names
    }

    fn model(&self, name: &str) -> Result<Arc<dyn Classifier>> {
        self.cache.get_or_load(self.source.as_ref(), name)
    }

    /// Validate the payload, pick the route and align the row for both models.
    ///
    /// Validation happens before any model is requested.
    pub fn prepare(&self, payload: &Payload) -> Result<PreparedRequest> {
        let observation = normalize(payload).inspect_err(|e| {
            if let WellbeingError::Validation { field, .. } = e {
                self.metrics.record_validation_failure(field);
            }
        })?;
        let row = FeatureRow::from_observation(&observation);
        let route = observation.route();

        let (mood_name, energy_name) = self.names.for_route(route);
        let mood_model = self.model(mood_name)?;
        let energy_model = self.model(energy_name)?;

        Ok(PreparedRequest {
            route,
            mood: align(&row, mood_model.as_ref(), mood_name)?,
            energy: align(&row, energy_model.as_ref(), energy_name)?,
            observation,
            row,
            mood_model,
            energy_model,
        })
    }

    /// Predict mood and energy for one raw payload
    pub fn predict(&self, payload: &Payload) -> Result<PredictionResult> {
        let prepared = self.prepare(payload)?;
        self.predict_prepared(&prepared)
    }

    /// Run both models on a request returned by [`Predictor::prepare`]
    pub fn predict_prepared(&self, prepared: &PreparedRequest) -> Result<PredictionResult> {
        let start = Instant::now();
        let mood_pred = class_index(prepared.mood_model.predict(&prepared.mood)?, "mood")?;
        let energy_pred = class_index(prepared.energy_model.predict(&prepared.energy)?, "energy")?;

        let result = PredictionResult {
            mood_pred,
            energy_pred,
            route: prepared.route,
            mood_proba: probabilities(prepared.mood_model.as_ref(), &prepared.mood, "mood"),
            energy_proba: probabilities(prepared.energy_model.as_ref(), &prepared.energy, "energy"),
        };

        self.metrics.record_prediction(result.route, start.elapsed());
        info!(
            route = %result.route,
            mood_pred = result.mood_pred,
            energy_pred = result.energy_pred,
            "Prediction served"
        );
        Ok(result)
    }
}

fn align(row: &FeatureRow, model: &dyn Classifier, name: &str) -> Result<AlignedFeatures> {
    let columns = model.expected_columns().ok_or_else(|| {
        WellbeingError::Configuration(format!("model {name} does not declare its input columns"))
    })?;
    Ok(row.align(columns))
}

fn class_index(class: usize, target: &str) -> Result<u8> {
    match u8::try_from(class) {
        Ok(c) if c <= 2 => Ok(c),
        _ => Err(WellbeingError::Configuration(format!(
            "{target} model returned class {class}, expected 0, 1 or 2"
        ))),
    }
}

// probabilities are optional output, a failing model only loses them
fn probabilities(model: &dyn Classifier, features: &AlignedFeatures, target: &str) -> Option<Vec<f64>> {
    match model.predict_proba(features) {
        Ok(proba) => proba,
        Err(e) => {
            warn!(target_name = target, error = %e, "Dropping class probabilities");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_are_distinct() {
        let names = ModelNames::default();
        assert_eq!(names.distinct(), 4);
        assert_eq!(names.for_route(Route::A).0, "mcphases_mood_modea_randomforest");
        assert_eq!(names.for_route(Route::B).1, "mcphases_energy_modeb_randomforest");
    }

    #[test]
    fn test_shared_names_count_once() {
        let names = ModelNames {
            mood_a: "shared".to_string(),
            mood_b: "shared".to_string(),
            energy_a: "energy".to_string(),
            energy_b: "energy".to_string(),
        };
        assert_eq!(names.distinct(), 2);
    }

    #[test]
    fn test_class_index_bounds() {
        assert_eq!(class_index(2, "mood").unwrap(), 2);
        assert!(class_index(3, "mood").is_err());
        assert!(class_index(usize::MAX, "energy").is_err());
    }
}
