//! Classifier capability and on-disk model artifacts.
//!
//! A model is anything implementing [`Classifier`]. Artifacts saved by the
//! training side are loaded into [`ModelArtifact`], which adapts the concrete
//! estimator (random forest or logistic regression) to that interface.

mod forest;
mod linear;

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WellbeingError};
use crate::features::AlignedFeatures;

pub use forest::{DecisionTree, RandomForest, TreeNode};
pub use linear::LogisticRegression;

/// What the predictor needs from a loaded model.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Class index for the single row in `features`
    fn predict(&self, features: &AlignedFeatures) -> Result<usize>;

    /// Per-class probabilities, when the model supports them
    fn predict_proba(&self, _features: &AlignedFeatures) -> Result<Option<Vec<f64>>> {
        Ok(None)
    }

    /// Ordered input columns the model was trained on
    fn expected_columns(&self) -> Option<&[String]>;
}

/// Concrete estimator stored in an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    /// Averaged decision trees
    RandomForest(RandomForest),
    /// Softmax (or sigmoid) over linear scores
    Logistic(LogisticRegression),
}

impl Estimator {
    fn feature_names(&self) -> Option<&[String]> {
        match self {
            Self::RandomForest(m) => m.feature_names.as_deref(),
            Self::Logistic(m) => m.feature_names.as_deref(),
        }
    }

    fn probabilities(&self, x: &[f64]) -> Result<Vec<f64>> {
        match self {
            Self::RandomForest(m) => m.probabilities(x),
            Self::Logistic(m) => m.probabilities(x),
        }
    }

    fn check(&self, width: Option<usize>) -> Result<()> {
        match self {
            Self::RandomForest(m) => m.check(width),
            Self::Logistic(m) => m.check(width),
        }
    }
}

/// A trained model as saved to disk.
///
/// The artifact-level `feature_names` wins over the estimator's own list, so a
/// training pipeline can record the columns once at the outermost level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Columns the whole pipeline was fitted on
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    /// Final estimator
    pub estimator: Estimator,
}

impl ModelArtifact {
    /// Parse a JSON artifact
    pub fn from_json(text: &str) -> Result<Self> {
        let artifact: Self = serde_json::from_str(text)?;
        artifact.check()?;
        Ok(artifact)
    }

    /// Parse a YAML artifact
    pub fn from_yaml(text: &str) -> Result<Self> {
        let artifact: Self = serde_yaml::from_str(text)?;
        artifact.check()?;
        Ok(artifact)
    }

    /// Load an artifact, picking the format from the file extension
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&text),
            Some("json") => Self::from_json(&text),
            _ => Err(WellbeingError::Configuration(format!(
                "unsupported model file {}",
                path.display()
            ))),
        }
    }

    fn check(&self) -> Result<()> {
        self.estimator.check(self.expected_columns().map(<[String]>::len))
    }

    fn row<'a>(&self, features: &'a AlignedFeatures) -> Result<&'a [f64]> {
        if let Some(expected) = self.expected_columns() {
            if features.columns() != expected {
                return Err(WellbeingError::Configuration(
                    "features are not aligned to this model's columns".to_string(),
                ));
            }
        }
        Ok(features.values())
    }
}

impl Classifier for ModelArtifact {
    fn predict(&self, features: &AlignedFeatures) -> Result<usize> {
        let proba = self.estimator.probabilities(self.row(features)?)?;
        argmax(&proba).ok_or_else(|| WellbeingError::Configuration("model has no classes".to_string()))
    }

    fn predict_proba(&self, features: &AlignedFeatures) -> Result<Option<Vec<f64>>> {
        self.estimator.probabilities(self.row(features)?).map(Some)
    }

    fn expected_columns(&self) -> Option<&[String]> {
        self.feature_names
            .as_deref()
            .or_else(|| self.estimator.feature_names())
    }
}

/// Index of the largest value; the lowest index wins ties
fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOREST_JSON: &str = r#"{
        "feature_names": ["sleep_duration_minutes", "stress_num"],
        "estimator": {
            "kind": "random_forest",
            "n_classes": 3,
            "trees": [
                {"nodes": [
                    {"feature": 0, "threshold": 360.0, "left": 1, "right": 2},
                    {"value": [8.0, 2.0, 0.0]},
                    {"value": [0.0, 2.0, 8.0]}
                ]}
            ]
        }
    }"#;

    fn features(columns: &[&str], values: Vec<f64>) -> AlignedFeatures {
        AlignedFeatures::new(columns.iter().map(ToString::to_string).collect(), values).unwrap()
    }

    #[test]
    fn test_artifact_feature_names_win() {
        let artifact = ModelArtifact::from_json(FOREST_JSON).unwrap();
        assert_eq!(
            artifact.expected_columns().unwrap(),
            &["sleep_duration_minutes".to_string(), "stress_num".to_string()]
        );
    }

    #[test]
    fn test_estimator_feature_names_fallback() {
        let yaml = r"
estimator:
  kind: logistic
  feature_names: [stress_num]
  coefficients: [[-1.0], [0.0], [1.0]]
  intercepts: [0.0, 0.0, 0.0]
";
        let artifact = ModelArtifact::from_yaml(yaml).unwrap();
        assert_eq!(artifact.expected_columns().unwrap(), &["stress_num".to_string()]);
    }

    #[test]
    fn test_no_feature_names_anywhere() {
        let yaml = r"
estimator:
  kind: logistic
  coefficients: [[1.0], [0.0], [-1.0]]
  intercepts: [0.0, 0.0, 0.0]
";
        let artifact = ModelArtifact::from_yaml(yaml).unwrap();
        assert!(artifact.expected_columns().is_none());
    }

    #[test]
    fn test_forest_predicts_and_exposes_proba() {
        let artifact = ModelArtifact::from_json(FOREST_JSON).unwrap();
        let short_sleep = features(&["sleep_duration_minutes", "stress_num"], vec![300.0, 4.0]);
        let long_sleep = features(&["sleep_duration_minutes", "stress_num"], vec![480.0, 1.0]);
        assert_eq!(artifact.predict(&short_sleep).unwrap(), 0);
        assert_eq!(artifact.predict(&long_sleep).unwrap(), 2);
        let proba = artifact.predict_proba(&long_sleep).unwrap().unwrap();
        assert!((proba[2] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_misaligned_features_rejected() {
        let artifact = ModelArtifact::from_json(FOREST_JSON).unwrap();
        let wrong = features(&["stress_num", "sleep_duration_minutes"], vec![1.0, 480.0]);
        assert!(matches!(artifact.predict(&wrong), Err(WellbeingError::Configuration(_))));
    }

    #[test]
    fn test_argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), Some(0));
        assert_eq!(argmax(&[]), None);
    }
}
