use serde::{Deserialize, Serialize};

use crate::error::{Result, WellbeingError};

/// Logistic regression.
///
/// With one coefficient row the model is binary (sigmoid); with one row per
/// class it is multinomial (softmax).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Columns the model was fitted on
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    /// `coefficients[class][feature]`
    pub coefficients: Vec<Vec<f64>>,
    /// One intercept per coefficient row
    pub intercepts: Vec<f64>,
}

impl LogisticRegression {
    fn scores(&self, x: &[f64]) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect()
    }

    pub(super) fn probabilities(&self, x: &[f64]) -> Result<Vec<f64>> {
        let width = self.coefficients.first().map_or(0, Vec::len);
        if x.len() != width {
            return Err(WellbeingError::Configuration(format!(
                "logistic model expects {width} columns, got {}",
                x.len()
            )));
        }

        let scores = self.scores(x);
        if let [z] = scores.as_slice() {
            let p = 1.0 / (1.0 + (-z).exp());
            return Ok(vec![1.0 - p, p]);
        }

        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        Ok(exps.into_iter().map(|e| e / sum).collect())
    }

    pub(super) fn check(&self, width: Option<usize>) -> Result<()> {
        let Some(first) = self.coefficients.first() else {
            return Err(WellbeingError::Configuration(
                "logistic model has no coefficients".to_string(),
            ));
        };
        if self.intercepts.len() != self.coefficients.len() {
            return Err(WellbeingError::Configuration(
                "one intercept per coefficient row is required".to_string(),
            ));
        }
        if self.coefficients.iter().any(|row| row.len() != first.len()) {
            return Err(WellbeingError::Configuration(
                "coefficient rows differ in length".to_string(),
            ));
        }
        let width = width.or_else(|| self.feature_names.as_ref().map(Vec::len));
        if width.is_some_and(|w| w != first.len()) {
            return Err(WellbeingError::Configuration(
                "coefficient rows do not match the declared columns".to_string(),
            ));
        }
        Ok(())
    }
}
